pub mod pages;
pub mod site;
pub mod viewer;
