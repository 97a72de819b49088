/*!
# IMS Form Records

Record keeping for quality-management forms stored in a spreadsheet service.

## Overview

Each form (an "LW" or "M&PR" file) lives in its own worksheet. The form's
schema, a title plus ordered field and signature names, comes from a JSON
configuration; the worksheet's header row is what actually decides where a
value lands. This crate keeps the two honest with each other and keeps the
spreadsheet service from throttling the application.

## Architecture

### Reconciliation
- **normalize**: Canonical keys for header names (NFKC, case, whitespace,
  smart punctuation)
- **reconcile**: Header mapping, drift report (missing / extra / order), and
  mapping of submitted values onto the live column order

### Remote access
- **accessor**: Single entry point for reads and writes; quota pacing,
  exponential backoff on quota errors, TTL cache with invalidation on write
- **quota**, **retry**, **cache**, **clock**: The pieces the accessor is built from
- **store**: The spreadsheet interface, an in-memory store and a local
  file-backed store

### Application
- **schema**: Typed form catalog validated at load, submissions
- **records**: Row padding, records, search, signature tallies
- **config**: Sheet types, TTLs, retry and quota settings
- **downloader** / **loader**: CSV (and XLSX) export, CSV import
- **app**: JSON HTTP API (feature `web`)

## Data Persistence Layer
- Local workbooks are stored with Gzip compression and bincode serialization
  (`database/<store id>.bin.gz`)

## REST API Endpoints (feature `web`)

- `/api/sheet-types` - Configured sheet types
- `/api/{type}/forms` - Forms of a sheet type
- `/api/{type}/worksheets/{name}?q=` - Records, optionally searched
- `/api/{type}/forms/{form}/report` - Schema drift report
- `/api/{type}/forms/{form}/entries` - Submit or edit an entry
- `/api/{type}/refresh` - Drop cached reads
*/

pub mod a1;
pub mod accessor;
pub mod cache;
pub mod clock;
pub mod config;
pub mod downloader;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod quota;
pub mod reconcile;
pub mod records;
pub mod retry;
pub mod saving;
pub mod schema;
pub mod store;
pub mod workbook;

#[cfg(feature = "web")]
pub mod app;

/// Re-export the types most callers need
pub use accessor::{AccessSettings, Accessor, WriteTarget};
pub use config::ImsConfig;
pub use error::{ConfigError, Delivery, RemoteError, StoreError};
pub use normalize::normalize;
pub use reconcile::{ReconciliationReport, build_mapping, diff, map_submission};
pub use records::{Record, SheetData};
pub use retry::RetryPolicy;
pub use schema::{FormCatalog, FormSchema, FormSubmission};
pub use store::{FileStore, MemoryStore, TabularStore};
