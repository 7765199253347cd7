fn main() {
    force_track::cli::run();
}
