pub mod datatype;
pub mod entity;
pub mod query;
pub mod repository;
pub mod service;
