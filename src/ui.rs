// UI layer: interactive menus using `dialoguer`, colored output via
// `crossterm`, a spinner from `indicatif` while a request is in flight.
// Everything here is presentation; the api module owns the contracts.

use crate::api::ApiClient;
use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::{Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Entry menu shown while anonymous. Runs until the user exits; a
/// successful login hands over to [`main_menu`] and we land back here
/// after logout or session expiry.
pub fn welcome_menu(mut api: ApiClient) -> Result<()> {
    loop {
        println!();
        println!("{}", "  M-PESA TERMINAL".cyan().bold());
        println!("  Manage your M-Pesa account from your terminal.\n");
        let items = vec!["Login", "Exit"];
        let selection = Select::new().items(&items).default(0).interact()?;
        match selection {
            0 => {
                if handle_login(&mut api)? {
                    main_menu(&mut api)?;
                }
            }
            1 => break,
            _ => {}
        }
    }
    println!("\n{}\n", "  Thank you for using M-Pesa Terminal!".green());
    Ok(())
}

/// Post-login menu. Leaves when the user logs out, or when an expired
/// token drops the session back to anonymous.
fn main_menu(api: &mut ApiClient) -> Result<()> {
    loop {
        if !api.session().is_authenticated() {
            break;
        }
        println!();
        println!(
            "  Logged in: {}  [{}]\n",
            api.session().display_name().bold(),
            api.session().phone_number
        );
        let items = vec![
            "Check balance",
            "Send money",
            "Deposit",
            "Withdraw",
            "Transaction history",
            "Logout",
        ];
        match Select::new().items(&items).default(0).interact()? {
            0 => handle_balance(api)?,
            1 => handle_send(api)?,
            2 => handle_deposit(api)?,
            3 => handle_withdraw(api)?,
            4 => handle_history(api)?,
            5 => {
                api.logout();
                print_success("You have been logged out safely. Goodbye!");
                break;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Collect credentials and log in. Returns whether the session is now
/// authenticated.
fn handle_login(api: &mut ApiClient) -> Result<bool> {
    let username: String = Input::new().with_prompt("Username").interact_text()?;
    let password: String = Password::new().with_prompt("Password").interact()?;

    let spinner = spinner("Connecting to M-Pesa server...");
    let outcome = api.login(&username, &password);
    spinner.finish_and_clear();

    match outcome {
        Ok(summary) => {
            print_success(&format!("Welcome back, {}!", summary.display_name));
            print_success(&format!("Phone: {}", summary.phone_number));
            Ok(true)
        }
        Err(e) => {
            print_error(&e.to_string());
            Ok(false)
        }
    }
}

fn handle_balance(api: &mut ApiClient) -> Result<()> {
    let spinner = spinner("Fetching balance...");
    let outcome = api.balance();
    spinner.finish_and_clear();

    match outcome {
        Ok(info) => {
            println!();
            println!("  {} {}", "Account Holder :".cyan(), info.account_holder);
            println!("  {} {}", "Phone Number   :".cyan(), info.phone_number);
            println!(
                "  {} {}",
                "Available Balance :".cyan(),
                format!("KES {}", info.balance).green().bold()
            );
        }
        Err(e) => print_error(&e.to_string()),
    }
    Ok(())
}

fn handle_send(api: &mut ApiClient) -> Result<()> {
    let recipient: String = Input::new()
        .with_prompt("Recipient phone (e.g. 0722345678)")
        .interact_text()?;
    let amount: f64 = Input::new().with_prompt("Amount (KES)").interact_text()?;
    let description: String = Input::new()
        .with_prompt("Description (optional)")
        .allow_empty(true)
        .interact_text()?;
    let pin: String = Password::new().with_prompt("Enter your M-Pesa PIN").interact()?;

    let spinner = spinner("Processing your transaction...");
    let outcome = api.send_money(&recipient, amount, &pin, &description);
    spinner.finish_and_clear();

    match outcome {
        Ok(receipt) => {
            print_success("Money sent successfully!");
            println!();
            println!("  {} {}", "Transaction ID :".cyan(), receipt.transaction_id);
            println!("  {} {}", "Sent To        :".cyan(), recipient);
            println!("  {} KES {:.2}", "Amount Sent    :".cyan(), amount);
            println!(
                "  {} {}",
                "New Balance    :".cyan(),
                format!("KES {}", receipt.new_balance).green()
            );
        }
        Err(e) => print_error(&e.to_string()),
    }
    Ok(())
}

fn handle_deposit(api: &mut ApiClient) -> Result<()> {
    print_info("Simulate a cash deposit (e.g. via M-Pesa agent)");
    let amount: f64 = Input::new()
        .with_prompt("Deposit amount (KES)")
        .interact_text()?;
    let reference: String = Input::new()
        .with_prompt("Reference/agent code (optional)")
        .allow_empty(true)
        .interact_text()?;

    let spinner = spinner("Processing deposit...");
    let outcome = api.deposit(amount, &reference);
    spinner.finish_and_clear();

    match outcome {
        Ok(receipt) => {
            print_success("Deposit successful!");
            println!();
            println!("  {} {}", "Transaction ID :".cyan(), receipt.transaction_id);
            println!("  {} KES {:.2}", "Amount         :".cyan(), amount);
            println!(
                "  {} {}",
                "New Balance    :".cyan(),
                format!("KES {}", receipt.new_balance).green()
            );
        }
        Err(e) => print_error(&e.to_string()),
    }
    Ok(())
}

fn handle_withdraw(api: &mut ApiClient) -> Result<()> {
    let amount: f64 = Input::new()
        .with_prompt("Withdrawal amount (KES)")
        .interact_text()?;
    let pin: String = Password::new().with_prompt("Enter your M-Pesa PIN").interact()?;

    let spinner = spinner("Processing withdrawal...");
    let outcome = api.withdraw(amount, &pin);
    spinner.finish_and_clear();

    match outcome {
        Ok(receipt) => {
            print_success("Withdrawal successful!");
            println!();
            println!("  {} {}", "Transaction ID :".cyan(), receipt.transaction_id);
            println!("  {} KES {:.2}", "Amount         :".cyan(), amount);
            println!(
                "  {} {}",
                "New Balance    :".cyan(),
                format!("KES {}", receipt.new_balance).green()
            );
        }
        Err(e) => print_error(&e.to_string()),
    }
    Ok(())
}

fn handle_history(api: &mut ApiClient) -> Result<()> {
    let spinner = spinner("Fetching transactions...");
    let outcome = api.history();
    spinner.finish_and_clear();

    let page = match outcome {
        Ok(page) => page,
        Err(e) => {
            print_error(&e.to_string());
            return Ok(());
        }
    };

    println!();
    println!("  {} {}\n", "Total recorded:".cyan(), page.count);

    if page.transactions.is_empty() {
        print_info("No transactions on record yet.");
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "  {:<10}{:<14}{:<14}{}",
            "TYPE", "AMOUNT(KES)", "BAL AFTER", "TRANSACTION ID"
        )
        .yellow()
    );
    println!("{}", format!("  {}", "-".repeat(58)).cyan());

    for t in &page.transactions {
        let row = format!(
            "  {:<10}{:<14}{:<14}{}",
            t.transaction_type, t.amount, t.balance_after, t.transaction_id
        );
        // Debits in red, credits in green.
        if t.transaction_type == "SEND" || t.transaction_type == "WITHDRAW" {
            println!("{}", row.red());
        } else {
            println!("{}", row.green());
        }
    }
    Ok(())
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn print_success(msg: &str) {
    println!("  {} {}", "[OK]".green().bold(), msg);
}

fn print_error(msg: &str) {
    println!("  {} {}", "[ERROR]".red().bold(), msg);
}

fn print_info(msg: &str) {
    println!("  {} {}", "[INFO]".yellow(), msg);
}
