pub mod db;
pub mod sheet;
