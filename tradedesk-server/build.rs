fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");

    // Pass through TRADEDESK_GIT_HASH from packaged builds
    println!("cargo:rerun-if-env-changed=TRADEDESK_GIT_HASH");
    if let Ok(hash) = std::env::var("TRADEDESK_GIT_HASH") {
        println!("cargo:rustc-env=TRADEDESK_GIT_HASH={}", hash);
    }
}
