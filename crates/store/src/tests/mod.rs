mod helpers;

mod persistence_tests;
