use crate::fmt_time;

/// Print recent collection jobs, newest first.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_jobs(
    pool: &sqlx::PgPool,
    channel: Option<i64>,
    limit: i64,
) -> anyhow::Result<()> {
    let limit = limit.clamp(1, 500);
    let rows = match channel {
        Some(id) => ftrack_db::list_channel_jobs(pool, id, limit).await?,
        None => ftrack_db::list_jobs(pool, limit).await?,
    };

    if rows.is_empty() {
        println!("no collection jobs recorded yet");
        return Ok(());
    }

    println!(
        "{:<7}{:<8}{:<13}{:<10}{:<18}{:>6}{:>6}{:>6}{:>6}  ERROR",
        "JOB", "CHANNEL", "TYPE", "STATUS", "CREATED", "FOUND", "PROC", "FILT", "FAIL"
    );
    for row in &rows {
        println!(
            "{:<7}{:<8}{:<13}{:<10}{:<18}{:>6}{:>6}{:>6}{:>6}  {}",
            row.id,
            row.channel_id,
            row.job_type,
            row.status,
            fmt_time(Some(row.created_at)),
            row.items_found,
            row.items_processed,
            row.items_filtered,
            row.items_failed,
            row.error_message.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
