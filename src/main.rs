fn main() {
    if let Err(err) = alarmd::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
