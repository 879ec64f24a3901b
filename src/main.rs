fn main() {
    if let Err(err) = ksj_cleanup::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
