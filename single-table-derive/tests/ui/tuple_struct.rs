use single_table_derive::Model;

#[derive(Model)]
struct Pair(String, String);

fn main() {}
