fn main() {
    // Firmware builds (feature `espidf`) need the esp-idf build environment
    // propagated to dependent crates; host builds have nothing to emit.
    if std::env::var_os("CARGO_FEATURE_ESPIDF").is_some() {
        embuild::espidf::sysenv::output();
    }
}
