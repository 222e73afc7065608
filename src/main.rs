fn main() {
    pe_class_records_lib::run()
}
