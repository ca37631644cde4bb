fn main() {
    extdb_proxy::cli::main();
}
