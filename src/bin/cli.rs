use sheetedit::downloader::column_to_letter;
use sheetedit::{CellValue, Document, ExportFormat, LocalSession};

use std::env;
use std::io::{self, Write};
use std::time::Instant;

const PREVIEW_ROWS: usize = 20;
const CELL_WIDTH: usize = 12;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <workbook.xlsx>", args[0]);
        return Ok(());
    }

    let mut session = LocalSession::open(&args[1])?;
    let mut start_time = Instant::now();
    let mut status = String::from("ok");
    let mut show = true;

    loop {
        if show {
            display(session.document());
        }
        show = false;

        let elapsed_time = start_time.elapsed().as_secs_f64();
        print!(
            "[{:.1}] ({}) {} > ",
            elapsed_time,
            status,
            session.document().active_sheet()
        );
        io::stdout().flush()?;

        let mut command = String::new();
        if io::stdin().read_line(&mut command)? == 0 {
            break;
        }
        let command = command.trim();
        start_time = Instant::now();

        let mut parts = command.splitn(2, ' ');
        let verb = parts.next().unwrap_or_default();
        let rest = parts.next().unwrap_or_default().trim();

        status = match verb {
            "" => "invalid command".to_string(),
            "q" => break,
            "help" => {
                print_help();
                "ok".to_string()
            }
            "sheets" => {
                for name in session.document().sheet_names() {
                    let marker = if name == session.document().active_sheet() {
                        "*"
                    } else {
                        " "
                    };
                    println!("{} {}", marker, name);
                }
                "ok".to_string()
            }
            "show" => {
                show = true;
                "ok".to_string()
            }
            "use" => match session.switch_sheet(rest) {
                Ok(_) => {
                    show = true;
                    "ok".to_string()
                }
                Err(e) => e.to_string(),
            },
            "set" => match parse_set(rest) {
                Some((row, col, value)) => match session.update_cell(row, col, value) {
                    Ok(_) => {
                        show = true;
                        "ok".to_string()
                    }
                    Err(e) => e.to_string(),
                },
                None => "usage: set <row> <col> <value>".to_string(),
            },
            "export" => {
                let target = if rest.is_empty() {
                    session.export(None, ExportFormat::Xlsx).map(|e| e.file_name)
                } else {
                    Ok(rest.to_string())
                };
                match target.and_then(|path| session.save_as(&path).map(|_| path)) {
                    Ok(path) => format!("saved {}", path),
                    Err(e) => e.to_string(),
                }
            }
            "csv" => match session.export(None, ExportFormat::Csv) {
                Ok(export) => {
                    print!("{}", String::from_utf8_lossy(&export.bytes));
                    "ok".to_string()
                }
                Err(e) => e.to_string(),
            },
            _ => "invalid command".to_string(),
        };
    }

    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  sheets: List sheets (* marks the active one)");
    println!("  use <sheet>: Switch the active sheet");
    println!("  show: Display the active sheet");
    println!("  set <row> <col> <value>: Edit a data cell (zero-based, below the headers)");
    println!("  export [path]: Save the workbook as xlsx");
    println!("  csv: Print the active sheet as CSV");
    println!("  q: Quit");
}

fn parse_set(args: &str) -> Option<(i64, i64, CellValue)> {
    let mut parts = args.splitn(3, ' ');
    let row = parts.next()?.parse().ok()?;
    let col = parts.next()?.parse().ok()?;
    let value = CellValue::from_input(parts.next().unwrap_or_default());
    Some((row, col, value))
}

fn display(doc: &Document) {
    if doc.active().is_empty() {
        println!("  (sheet {} is empty)", doc.active_sheet());
        return;
    }
    let width = doc.active().width();

    print!("{:>5} ", "");
    for c in 0..width {
        print!("{:<w$} ", column_to_letter(c), w = CELL_WIDTH);
    }
    println!();

    print!("{:>5} ", "");
    for c in 0..width {
        let header = doc.headers().get(c).map(String::as_str).unwrap_or("");
        print!("{:<w$} ", clip(header), w = CELL_WIDTH);
    }
    println!();

    for (r, cells) in doc.data().iter().take(PREVIEW_ROWS).enumerate() {
        print!("{:>5} ", r);
        for c in 0..width {
            let text = cells.get(c).map(CellValue::to_string).unwrap_or_default();
            print!("{:<w$} ", clip(&text), w = CELL_WIDTH);
        }
        println!();
    }

    if doc.data().len() > PREVIEW_ROWS {
        println!("  ... {} more row(s)", doc.data().len() - PREVIEW_ROWS);
    }
}

fn clip(text: &str) -> String {
    if text.chars().count() > CELL_WIDTH {
        let mut clipped: String = text.chars().take(CELL_WIDTH - 1).collect();
        clipped.push('~');
        clipped
    } else {
        text.to_string()
    }
}
