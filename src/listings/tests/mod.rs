mod common;

mod reconcile;
mod views;
