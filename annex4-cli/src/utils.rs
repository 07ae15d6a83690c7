use colored::*;

pub fn print_banner() {
    println!("{}", "Annex4 Monitor".cyan().bold());
    println!("{}", "EU AI Act source watcher & compliance remapper\n".green());
}

pub fn print_success(message: &str) {
    println!("{} {}", "OK".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "ERROR".red().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "--".blue(), message);
}
