/*!
# sheetedit

Upload a spreadsheet, edit its cells sheet by sheet, and download it again.

## Overview

The core is an in-memory workbook document: every sheet is a table whose first row is
its headers, one sheet is active, and cell edits always target the active sheet. The
core only deals with bytes in and bytes out; the surrounding front ends decide where
those bytes come from.

## Data flow

```text
workbook bytes --loader--> Document --switch_sheet / set_cell--> Document --downloader--> xlsx bytes
```

## Front ends

- **Local** ([`session::LocalSession`]): one document held in-process; used by the
  `sheetedit-cli` binary.
- **HTTP** ([`app`], feature `web`): documents kept in a [`store::DocumentStore`] keyed
  by file id, each file behind its own lock, idle files evicted after a TTL.

## REST API Endpoints

- `POST /api/upload` - multipart upload (field `file`)
- `GET /api/sheets/{fileId}` - current document
- `POST /api/sheets/{fileId}/change-sheet` - `{ "sheetName": ... }`
- `POST /api/sheets/{fileId}/update-cell` - `{ "rowIndex", "columnIndex", "value" }`
- `GET /api/sheets/{fileId}/export` - download (`?fileName=..&format=xlsx|csv`)
- `DELETE /api/sheets/{fileId}` - release the file

## Modules

- **cell**: scalar cell values
- **spreadsheet**: sheet tables and the document model
- **loader**: workbook bytes to document
- **downloader**: document to xlsx / csv
- **saving**: atomic export to disk
- **store**: file-id keyed document storage
- **session**: local and store-backed editing surfaces
- **config**: server configuration
- **app**: HTTP routing and handlers
*/

pub mod cell;
pub mod config;
pub mod downloader;
pub mod error;
pub mod loader;
pub mod saving;
pub mod session;
pub mod spreadsheet;
pub mod store;

#[cfg(feature = "web")]
pub mod app;

pub use cell::CellValue;
pub use error::{Result, SheetError};
pub use session::{Export, ExportFormat, LocalSession, OpenFile, StoreService, WorkbookService};
pub use spreadsheet::{Document, SheetTable};
pub use store::{DocumentStore, FileId, MemoryStore, StoredFile};
