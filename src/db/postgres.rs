use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::ExecutionError;
use crate::execution::ExecutionSink;
use crate::models::{ExecutionReceipt, Side, TradeSignal};
use crate::Result;

/// Records every executed signal as a row in `trade_fills`
///
/// Acts as a paper-trading sink backed by Postgres: the fill is immediate at
/// the signal price, and the insert must succeed for the signal to count as
/// executed.
#[derive(Clone)]
pub struct PostgresTradeStore {
    pool: PgPool,
    fee_rate: f64,
}

impl PostgresTradeStore {
    /// Connect to Postgres
    ///
    /// # Arguments
    /// * `database_url` - Postgres connection URL
    /// * `fee_rate` - Fraction of notional recorded as fee on each fill
    pub async fn new(database_url: &str, fee_rate: f64) -> Result<Self> {
        let options: PgConnectOptions = database_url.parse()?;
        let target = connection_target(&options);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("Connected to Postgres at {}", target);

        Ok(Self { pool, fee_rate })
    }

    /// Save a fill
    pub async fn save_fill(
        &self,
        receipt: &ExecutionReceipt,
        signal_time: Option<DateTime<Utc>>,
    ) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO trade_fills (id, symbol, side, price, qty, fee, signal_time, executed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(receipt.id)
        .bind(&receipt.symbol)
        .bind(receipt.side.as_str())
        .bind(receipt.price)
        .bind(receipt.qty)
        .bind(receipt.fee)
        .bind(signal_time)
        .bind(receipt.executed_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            "Saved {} fill {} for {} to Postgres",
            receipt.side,
            receipt.id,
            receipt.symbol
        );

        Ok(())
    }

    /// Load all fills for a symbol, oldest first
    pub async fn load_fills(&self, symbol: &str) -> Result<Vec<ExecutionReceipt>> {
        let rows = sqlx::query(
            r#"
            SELECT id, symbol, side, price, qty, fee, executed_at
            FROM trade_fills
            WHERE symbol = $1
            ORDER BY executed_at ASC
            "#,
        )
        .bind(symbol)
        .fetch_all(&self.pool)
        .await?;

        let mut fills = Vec::with_capacity(rows.len());

        for row in rows {
            let id: Uuid = row.get("id");
            let side_str: String = row.get("side");

            let side = match side_str.as_str() {
                "BUY" => Side::Buy,
                "SELL" => Side::Sell,
                _ => return Err(format!("Invalid side '{}' for fill {}", side_str, id).into()),
            };

            fills.push(ExecutionReceipt {
                id,
                symbol: row.get("symbol"),
                side,
                price: row.get("price"),
                qty: row.get("qty"),
                fee: row.get("fee"),
                executed_at: row.get("executed_at"),
            });
        }

        tracing::info!("Loaded {} fills for {} from Postgres", fills.len(), symbol);

        Ok(fills)
    }
}

/// `host:port/database`, without credentials
fn connection_target(options: &PgConnectOptions) -> String {
    format!(
        "{}:{}/{}",
        options.get_host(),
        options.get_port(),
        options.get_database().unwrap_or("-")
    )
}

#[async_trait]
impl ExecutionSink for PostgresTradeStore {
    async fn execute(
        &self,
        signal: &TradeSignal,
    ) -> std::result::Result<ExecutionReceipt, ExecutionError> {
        let fee = signal.qty * signal.price * self.fee_rate;
        let receipt = ExecutionReceipt::filled(signal, fee);

        self.save_fill(&receipt, signal.timestamp).await?;

        Ok(receipt)
    }
}
