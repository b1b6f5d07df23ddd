fn main() {
    #[cfg(feature = "cli")]
    vcdec::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("vcdec: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
