#![allow(dead_code)]

use rust_xlsxwriter::{Format, Workbook};

/// Two sheets: `Sheet1` = Name/Age with one row for Alice, `Sheet2` = a lone `X` header.
pub fn two_sheet_workbook() -> Vec<u8> {
    let mut workbook = Workbook::new();

    let sheet1 = workbook.add_worksheet();
    sheet1.set_name("Sheet1").unwrap();
    sheet1.write_string(0, 0, "Name").unwrap();
    sheet1.write_string(0, 1, "Age").unwrap();
    sheet1.write_string(1, 0, "Alice").unwrap();
    sheet1.write_string(1, 1, "30").unwrap();

    let sheet2 = workbook.add_worksheet();
    sheet2.set_name("Sheet2").unwrap();
    sheet2.write_string(0, 0, "X").unwrap();

    workbook.save_to_buffer().unwrap()
}

/// Mixed scalar types, a gap inside a row, and an entirely empty third sheet.
pub fn mixed_workbook() -> Vec<u8> {
    let mut workbook = Workbook::new();

    let data = workbook.add_worksheet();
    data.set_name("Data").unwrap();
    data.write_string(0, 0, "Item").unwrap();
    data.write_string(0, 1, "Qty").unwrap();
    data.write_string(0, 2, "Paid").unwrap();
    data.write_string(1, 0, "Apple").unwrap();
    data.write_number(1, 1, 3.0).unwrap();
    data.write_boolean(1, 2, true).unwrap();
    data.write_string(2, 0, "Pear").unwrap();
    data.write_boolean(2, 2, false).unwrap();
    data.write_number(3, 1, 2.5).unwrap();

    let notes = workbook.add_worksheet();
    notes.set_name("Notes").unwrap();
    notes.write_number(0, 0, 2024.0).unwrap();
    notes.write_string(0, 1, "header").unwrap();
    notes.write_string(1, 0, "text, with comma").unwrap();

    let blank = workbook.add_worksheet();
    blank.set_name("Blank").unwrap();

    workbook.save_to_buffer().unwrap()
}

/// One `When` column: a serial far past 9999-12-31, a date-time and a duration, each
/// carrying a date or time number format.
pub fn dated_workbook() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let date = Format::new().set_num_format("yyyy-mm-dd");
    let datetime = Format::new().set_num_format("yyyy-mm-dd hh:mm");
    let elapsed = Format::new().set_num_format("[h]:mm:ss");

    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "When").unwrap();
    sheet.write_number_with_format(1, 0, 1.0e9, &date).unwrap();
    sheet.write_number_with_format(2, 0, 45292.5, &datetime).unwrap();
    sheet.write_number_with_format(3, 0, 1.5, &elapsed).unwrap();

    workbook.save_to_buffer().unwrap()
}
