// Integration tests module

mod integration {
    mod alerts_test;
    mod cache_test;
    mod collector_test;
    mod config_test;
    mod mock;
}
