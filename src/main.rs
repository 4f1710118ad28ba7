use fieldcart_lib::cli::{parse_args, CartCommand, Command};
use fieldcart_lib::commands;

#[tokio::main]
async fn main() {
    let cli = parse_args();
    let code = match cli.command {
        Command::Cart(CartCommand::AddCamera(args)) => commands::run_cart_add_camera(args).await,
        Command::Cart(CartCommand::AddOccurrence(args)) => {
            commands::run_cart_add_occurrence(args).await
        }
        Command::Cart(CartCommand::List(args)) => commands::run_cart_list(args).await,
        Command::Cart(CartCommand::Remove(args)) => commands::run_cart_remove(args).await,
        Command::Cart(CartCommand::Clear(args)) => commands::run_cart_clear(args).await,
        Command::Export(args) => commands::run_export(args).await,
    };
    std::process::exit(code);
}
