fn main() {
    if let Err(err) = report_consolidator::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
