//! Relational-store lookup for record enrichment.
//!
//! The [`EnrichStore`] wraps a libSQL connection to the MES database. One
//! connection is opened per processed file (never pooled); the single
//! read-only query joins the unit, work-order, and panel-block tables to
//! resolve an order number and block number for a serial.
//!
//! A connection failure abandons only the current file. A query failure is
//! recoverable: the caller logs it and proceeds with an empty enrichment.

use aoirelay_shared::{Enrichment, RelayError, Result};
use libsql::{Connection, Database, params};
use tracing::debug;

/// The single enrichment query. The serial may appear in the trace table
/// as either a PCB id or a block id; both columns are matched.
const LOOKUP_SQL: &str = "\
SELECT w.order_number, p.block_no
  FROM unit_items u
  LEFT JOIN work_orders w ON u.order_id = w.id
  LEFT JOIN panel_block_trace p
    ON u.serial_number = p.pcb_id OR u.serial_number = p.block_id
 WHERE u.serial_number = ?1";

/// Per-file connection to the enrichment store.
pub struct EnrichStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl EnrichStore {
    /// Connect to the store named by the connection descriptor.
    pub async fn connect(database: &str) -> Result<Self> {
        let db = libsql::Builder::new_local(database)
            .build()
            .await
            .map_err(|e| RelayError::Lookup(format!("connect to '{database}': {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| RelayError::Lookup(e.to_string()))?;

        Ok(Self { db, conn })
    }

    /// Resolve the order number and block number for a serial.
    ///
    /// Returns the first matching row's two columns. Zero matching rows is
    /// an empty enrichment, not an error.
    pub async fn lookup(&self, serial: &str) -> Result<Enrichment> {
        let mut rows = self
            .conn
            .query(LOOKUP_SQL, params![serial])
            .await
            .map_err(|e| RelayError::Lookup(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let enrichment = Enrichment {
                    order_number: row.get::<String>(0).ok(),
                    block_number: row.get::<String>(1).ok(),
                };
                debug!(
                    serial,
                    order = enrichment.order_number.as_deref().unwrap_or(""),
                    block = enrichment.block_number.as_deref().unwrap_or(""),
                    "enrichment row matched"
                );
                Ok(enrichment)
            }
            Ok(None) => {
                debug!(serial, "no enrichment row for serial");
                Ok(Enrichment::default())
            }
            Err(e) => Err(RelayError::Lookup(e.to_string())),
        }
    }
}
