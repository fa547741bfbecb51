pub mod parser;
pub mod process;
pub mod proxy;
pub mod repl;
pub mod shell;
