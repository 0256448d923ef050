fn main() {
    fabric_lens_lib::run()
}
