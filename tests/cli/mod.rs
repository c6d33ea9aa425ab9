mod argument_parsing;
mod commands;
mod config_file;
