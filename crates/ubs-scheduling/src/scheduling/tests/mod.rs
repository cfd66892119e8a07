mod common;
mod patients;
