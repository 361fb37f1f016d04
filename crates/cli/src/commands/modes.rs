//! `taskloom modes`: list modes and their defaults.

use taskloom_controller::Mode;

pub fn run() {
    for mode in Mode::ALL {
        println!("{:<10} {}", mode.name(), mode.description());
        for (key, value) in mode.defaults().iter() {
            if key.ends_with("prompt") {
                continue;
            }
            println!("    {key} = {value}");
        }
        println!();
    }
}
