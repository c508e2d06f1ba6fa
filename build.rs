fn main() {
    // Emit ESP-IDF link/include directives only when the firmware feature is
    // enabled; host builds (tests) must stay toolchain-free.
    if std::env::var("CARGO_FEATURE_ESP32").is_ok() {
        embuild::espidf::sysenv::output();
    }
}
