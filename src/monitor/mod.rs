pub mod decision;
pub mod history;
pub mod price;
pub mod runner;
