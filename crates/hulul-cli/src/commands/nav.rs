use colored::Colorize;

use crate::bootstrap::AppBootstrap;

pub fn show(app: &AppBootstrap, current_path: &str) {
    let sidebar = app.sidebar();
    for item in sidebar.items(current_path) {
        let line = format!("{:<26} {}", item.path, item.label);
        if item.active {
            println!("{} {}", ">".green().bold(), line.green());
        } else {
            println!("  {}", line);
        }
    }
    println!();
    println!("Contact us: {}", sidebar.contact_link().cyan());
}
