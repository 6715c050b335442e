fn main() {
    if let Err(err) = sanitycheck::cli::run() {
        sanitycheck::ui::output::error(format!("{err:#}"));
        std::process::exit(1);
    }
}
