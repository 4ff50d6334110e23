fn main() {
    if let Err(err) = deptree_render::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
