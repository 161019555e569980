//! Interactive menu for running the shop from a terminal.
//!
//! Reads one answer per line from any `BufRead` and writes prompts and
//! results to any `Write`, so the same code drives stdin/stdout and tests.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use rust_decimal::Decimal;

use crate::error::ShopError;
use crate::models::{Customer, Invoice, Item};
use crate::services::inventory::parse_object_id;
use crate::services::pdf::{console_filename, render_invoice_pdf};
use crate::services::reports::{
    daily_sales, render_sales_graph, summarize, GRAPH_DAYS, STATS_DAYS, TOP_CUSTOMERS,
};
use crate::services::{
    InventoryService, InvoiceLine, InvoiceService, ItemUpdate, NewInvoice, NewItem, StockMode,
};

const DEFAULT_TAX_RATE: i64 = 5;
const DEFAULT_DISCOUNT_RATE: i64 = 2;

pub struct Console<R, W> {
    input: R,
    output: W,
    inventory: InventoryService,
    invoices: InvoiceService,
    output_dir: PathBuf,
}

/// Outcome of one menu selection.
enum Flow {
    Continue,
    Exit,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(
        input: R,
        output: W,
        inventory: InventoryService,
        invoices: InvoiceService,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            input,
            output,
            inventory,
            invoices,
            output_dir,
        }
    }

    /// Run the menu until the user exits or input ends.
    pub async fn run(&mut self) -> io::Result<()> {
        let shop = self.invoices.shop().name.clone();
        writeln!(self.output, "Welcome to {}!", shop)?;

        loop {
            match self.menu().await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => break,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    writeln!(self.output, "\nExiting program...")?;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        writeln!(self.output, "Thank you for using {}! Goodbye.", shop)?;
        self.output.flush()
    }

    async fn menu(&mut self) -> io::Result<Flow> {
        let profile = self.invoices.shop().clone();
        writeln!(self.output, "\n{}", "=".repeat(60))?;
        writeln!(self.output, "    {} - MAIN MENU", profile.name.to_uppercase())?;
        writeln!(self.output, "        {}", profile.address)?;
        writeln!(self.output, "{}", "=".repeat(60))?;
        for line in [
            "1.  Add Item",
            "2.  View Items",
            "3.  Update Item",
            "4.  Remove Item",
            "5.  Generate Invoice",
            "6.  Display Sales Graph",
            "7.  Display Sales Report",
            "8.  Find Invoice by ID",
            "9.  Search Item",
            "10. Show All Invoices",
            "11. Exit",
        ] {
            writeln!(self.output, "{}", line)?;
        }
        writeln!(self.output, "{}", "=".repeat(50))?;

        let Ok(choice) = self.prompt("Enter your choice (1-11): ")?.parse::<u32>() else {
            writeln!(self.output, "Error: Invalid input. Please try again.")?;
            return Ok(Flow::Continue);
        };

        match choice {
            1 => self.add_item().await?,
            2 => self.view_items().await?,
            3 => self.update_item().await?,
            4 => self.remove_item().await?,
            5 => self.generate_invoice().await?,
            6 => self.sales_graph().await?,
            7 => self.sales_report().await?,
            8 => self.find_invoice().await?,
            9 => self.search_item().await?,
            10 => self.show_invoices().await?,
            11 => return Ok(Flow::Exit),
            _ => writeln!(self.output, "Invalid choice. Please select 1-11.")?,
        }
        Ok(Flow::Continue)
    }

    fn prompt(&mut self, label: &str) -> io::Result<String> {
        write!(self.output, "{}", label)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
        }
        Ok(line.trim().to_string())
    }

    /// Prompt for a number. `None` after telling the user the input was bad.
    fn prompt_parsed<T: std::str::FromStr>(&mut self, label: &str) -> io::Result<Option<T>> {
        let answer = self.prompt(label)?;
        match answer.parse() {
            Ok(value) => Ok(Some(value)),
            Err(_) => {
                writeln!(self.output, "Error: Invalid input. Please try again.")?;
                Ok(None)
            }
        }
    }

    fn report_error(&mut self, err: ShopError) -> io::Result<()> {
        writeln!(self.output, "Error: {}", err)
    }

    fn currency(&self) -> String {
        self.invoices.shop().currency.clone()
    }

    fn print_items(&mut self, items: &[Item]) -> io::Result<()> {
        let currency = self.currency();
        writeln!(
            self.output,
            "{:<24} | {:<24} | {:>12} | {:>6} | {:<6}",
            "ID", "Item Name", "Price", "Stock", "Unit"
        )?;
        writeln!(self.output, "{}", "-".repeat(86))?;
        for item in items {
            writeln!(
                self.output,
                "{:<24} | {:<24} | {:>12} | {:>6} | {:<6}",
                item.id.to_hex(),
                item.item_name,
                format!("{} {:.2}", currency, item.item_price.round_dp(2)),
                item.stock,
                item.unit
            )?;
        }
        Ok(())
    }

    async fn add_item(&mut self) -> io::Result<()> {
        writeln!(self.output, "\n--- ADD ITEMS ---")?;
        let item_name = self.prompt("Enter item name: ")?;
        let Some(item_price) = self.prompt_parsed::<Decimal>("Enter item price: ")? else {
            return Ok(());
        };
        let Some(stock) = self.prompt_parsed::<i64>("Enter stock quantity: ")? else {
            return Ok(());
        };
        let unit = self.prompt("Enter unit (e.g. kg, pcs) [pcs]: ")?;

        let new = NewItem {
            item_name,
            item_price,
            stock,
            unit: Some(unit),
        };
        match self.inventory.add_item(new).await {
            Ok(added) if added.created => writeln!(
                self.output,
                "Item {} added with ID: {}",
                added.item.item_name,
                added.item.id.to_hex()
            ),
            Ok(added) => writeln!(
                self.output,
                "Updated stock for {}. New stock: {}",
                added.item.item_name, added.item.stock
            ),
            Err(e) => self.report_error(e),
        }
    }

    async fn view_items(&mut self) -> io::Result<()> {
        writeln!(self.output, "\n--- INVENTORY ---")?;
        match self.inventory.list_items().await {
            Ok(items) if items.is_empty() => writeln!(self.output, "No items in inventory."),
            Ok(items) => self.print_items(&items),
            Err(e) => self.report_error(e),
        }
    }

    async fn search_item(&mut self) -> io::Result<()> {
        let term = self.prompt("Enter item name to search: ")?;
        match self.inventory.search_items(&term).await {
            Ok(items) if items.is_empty() => writeln!(self.output, "No items found."),
            Ok(items) => self.print_items(&items),
            Err(e) => self.report_error(e),
        }
    }

    async fn update_item(&mut self) -> io::Result<()> {
        self.view_items().await?;
        let id = self.prompt("Enter item ID to update: ")?;
        if let Err(e) = self.inventory.get_item(&id).await {
            return self.report_error(e);
        }

        writeln!(self.output, "1. Update price")?;
        writeln!(self.output, "2. Update stock")?;
        let update = match self.prompt_parsed::<u32>("Enter your choice: ")? {
            Some(1) => match self.prompt_parsed::<Decimal>("Enter new price: ")? {
                Some(price) => ItemUpdate {
                    item_price: Some(price),
                    ..Default::default()
                },
                None => return Ok(()),
            },
            Some(2) => match self.prompt_parsed::<i64>("Enter additional stock: ")? {
                Some(extra) => ItemUpdate {
                    stock: Some(extra),
                    mode: StockMode::Add,
                    ..Default::default()
                },
                None => return Ok(()),
            },
            Some(_) => return writeln!(self.output, "Invalid choice."),
            None => return Ok(()),
        };

        match self.inventory.update_item(&id, update).await {
            Ok(item) => writeln!(
                self.output,
                "Item {} updated. Price: {:.2}, Stock: {}",
                item.item_name,
                item.item_price.round_dp(2),
                item.stock
            ),
            Err(e) => self.report_error(e),
        }
    }

    async fn remove_item(&mut self) -> io::Result<()> {
        self.view_items().await?;
        let id = self.prompt("Enter item ID to remove: ")?;
        match self.inventory.delete_item(&id).await {
            Ok(()) => writeln!(self.output, "Item removed successfully."),
            Err(e) => self.report_error(e),
        }
    }

    async fn generate_invoice(&mut self) -> io::Result<()> {
        writeln!(self.output, "\n--- GENERATE INVOICE ---")?;
        let customer_name = self.prompt("Enter customer name: ")?;
        let customer_address = self.prompt("Enter customer address: ")?;
        let customer_number = self.prompt("Enter customer contact number: ")?;
        let email = self.prompt("Enter customer email (optional): ")?;

        let mut lines: Vec<(Item, u32)> = Vec::new();
        loop {
            writeln!(self.output, "\n--- ADD ITEMS TO INVOICE ---")?;
            self.view_items().await?;

            let answer = self.prompt("Enter item ID (or 'done' to finish): ")?;
            if answer.eq_ignore_ascii_case("done") {
                break;
            }
            if parse_object_id(&answer).is_err() {
                writeln!(self.output, "Invalid item ID.")?;
                continue;
            }
            let item = match self.inventory.get_item(&answer).await {
                Ok(item) => item,
                Err(ShopError::ItemNotFound(_)) => {
                    writeln!(self.output, "Item not found.")?;
                    continue;
                }
                Err(e) => {
                    self.report_error(e)?;
                    continue;
                }
            };

            let label = format!("Enter quantity for {}: ", item.item_name);
            let quantity = match self.prompt_parsed::<u32>(&label)? {
                Some(q) if q > 0 => q,
                Some(_) => {
                    writeln!(self.output, "Quantity must be greater than zero.")?;
                    continue;
                }
                None => continue,
            };

            let already: i64 = lines
                .iter()
                .filter(|(i, _)| i.id == item.id)
                .map(|(_, q)| i64::from(*q))
                .sum();
            let available = item.stock - already;
            if i64::from(quantity) > available {
                writeln!(self.output, "Not enough stock. Available: {}", available)?;
                continue;
            }

            writeln!(self.output, "Added {} x {} to invoice.", quantity, item.item_name)?;
            lines.push((item, quantity));
        }

        if lines.is_empty() {
            return writeln!(self.output, "No items added to invoice.");
        }

        let tax_label = format!("Enter tax rate % [{}]: ", DEFAULT_TAX_RATE);
        let Some(tax_rate) = self.prompt_rate(&tax_label, DEFAULT_TAX_RATE)? else {
            return Ok(());
        };
        let discount_label = format!("Enter discount rate % [{}]: ", DEFAULT_DISCOUNT_RATE);
        let Some(discount_rate) = self.prompt_rate(&discount_label, DEFAULT_DISCOUNT_RATE)? else {
            return Ok(());
        };

        let new = NewInvoice {
            customer: Customer {
                customer_name,
                customer_address,
                customer_number,
                customer_email: Some(email).filter(|e| !e.is_empty()),
            },
            lines: lines
                .iter()
                .map(|(item, quantity)| InvoiceLine {
                    item_id: item.id.to_hex(),
                    quantity: i64::from(*quantity),
                })
                .collect(),
            tax_rate,
            discount_rate,
        };

        let invoice = match self.invoices.create_invoice(new).await {
            Ok(invoice) => invoice,
            Err(e) => return self.report_error(e),
        };

        self.print_invoice(&invoice)?;
        self.save_pdf(&invoice)
    }

    fn prompt_rate(&mut self, label: &str, default: i64) -> io::Result<Option<Decimal>> {
        let answer = self.prompt(label)?;
        if answer.is_empty() {
            return Ok(Some(Decimal::from(default)));
        }
        match answer.parse::<Decimal>() {
            Ok(rate) => Ok(Some(rate)),
            Err(_) => {
                writeln!(self.output, "Error: Invalid input. Please try again.")?;
                Ok(None)
            }
        }
    }

    fn save_pdf(&mut self, invoice: &Invoice) -> io::Result<()> {
        let bytes = match render_invoice_pdf(invoice, self.invoices.shop()) {
            Ok(bytes) => bytes,
            Err(e) => return self.report_error(e),
        };
        let path = self.output_dir.join(console_filename(invoice));
        match std::fs::write(&path, bytes) {
            Ok(()) => writeln!(self.output, "Invoice saved to {}", path.display()),
            Err(e) => {
                tracing::error!(path = %path.display(), "Failed to write invoice PDF: {}", e);
                writeln!(self.output, "Error: could not save PDF: {}", e)
            }
        }
    }

    fn print_invoice(&mut self, invoice: &Invoice) -> io::Result<()> {
        let currency = self.currency();
        writeln!(self.output, "\n--- INVOICE {} ---", invoice.invoice_id)?;
        writeln!(self.output, "Customer: {}", invoice.customer_name)?;
        writeln!(self.output, "Address: {}", invoice.customer_address)?;
        writeln!(self.output, "Contact: {}", invoice.customer_number)?;
        writeln!(
            self.output,
            "Date: {}",
            invoice.order_date.format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(self.output, "\nItems:")?;
        for line in &invoice.items {
            writeln!(
                self.output,
                "  {} - {} x {} {:.2} = {} {:.2}",
                line.name,
                line.quantity,
                currency,
                line.price.round_dp(2),
                currency,
                line.line_total().round_dp(2)
            )?;
        }
        writeln!(self.output, "Subtotal: {} {:.2}", currency, invoice.subtotal.round_dp(2))?;
        writeln!(self.output, "Tax: {} {:.2}", currency, invoice.tax.round_dp(2))?;
        writeln!(self.output, "Discount: {} {:.2}", currency, invoice.discount.round_dp(2))?;
        writeln!(self.output, "Total: {} {:.2}", currency, invoice.total.round_dp(2))
    }

    async fn find_invoice(&mut self) -> io::Result<()> {
        let Some(id) = self.prompt_parsed::<i64>("Enter invoice ID: ")? else {
            return Ok(());
        };
        match self.invoices.get_invoice(id).await {
            Ok(invoice) => self.print_invoice(&invoice),
            Err(ShopError::InvoiceNotFound(_)) => writeln!(self.output, "Invoice not found."),
            Err(e) => self.report_error(e),
        }
    }

    async fn show_invoices(&mut self) -> io::Result<()> {
        let invoices = match self.invoices.list_invoices().await {
            Ok(invoices) => invoices,
            Err(e) => return self.report_error(e),
        };
        if invoices.is_empty() {
            return writeln!(self.output, "No invoices found.");
        }

        let currency = self.currency();
        writeln!(
            self.output,
            "{:>10} | {:<24} | {:<16} | {:>14}",
            "Invoice ID", "Customer", "Date", "Total"
        )?;
        writeln!(self.output, "{}", "-".repeat(72))?;
        for invoice in &invoices {
            writeln!(
                self.output,
                "{:>10} | {:<24} | {:<16} | {:>14}",
                invoice.invoice_id,
                invoice.customer_name,
                invoice.order_date.format("%Y-%m-%d %H:%M"),
                format!("{} {:.2}", currency, invoice.total.round_dp(2))
            )?;
        }
        Ok(())
    }

    async fn sales_report(&mut self) -> io::Result<()> {
        let invoices = match self.invoices.list_invoices().await {
            Ok(invoices) => invoices,
            Err(e) => return self.report_error(e),
        };
        let stats = summarize(&invoices, TOP_CUSTOMERS, STATS_DAYS);
        let currency = self.currency();

        writeln!(self.output, "\n--- SALES REPORT ---")?;
        writeln!(self.output, "Total Invoices: {}", stats.total_invoices)?;
        writeln!(
            self.output,
            "Total Revenue: {} {:.2}",
            currency,
            stats.total_revenue.round_dp(2)
        )?;

        if !stats.top_customers.is_empty() {
            writeln!(self.output, "\n--- TOP CUSTOMERS ---")?;
            for customer in &stats.top_customers {
                writeln!(
                    self.output,
                    "{}: {} {:.2} ({} invoices)",
                    customer.customer_name,
                    currency,
                    customer.total_spent.round_dp(2),
                    customer.invoice_count
                )?;
            }
        }

        if !stats.daily_sales.is_empty() {
            writeln!(self.output, "\n--- RECENT DAILY SALES ---")?;
            for day in &stats.daily_sales {
                writeln!(
                    self.output,
                    "{}: {} {:.2} ({} invoices)",
                    day.date.format("%Y-%m-%d"),
                    currency,
                    day.total.round_dp(2),
                    day.invoice_count
                )?;
            }
        }
        Ok(())
    }

    async fn sales_graph(&mut self) -> io::Result<()> {
        let invoices = match self.invoices.list_invoices().await {
            Ok(invoices) => invoices,
            Err(e) => return self.report_error(e),
        };
        let graph = render_sales_graph(&daily_sales(&invoices, GRAPH_DAYS), &self.currency());
        write!(self.output, "{}", graph)
    }

    /// The writer, for inspecting what was printed.
    pub fn output(&self) -> &W {
        &self.output
    }
}
