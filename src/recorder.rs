// ===============================
// src/recorder.rs
// ===============================
//
// Audit log JSONL untuk alur signal (alert masuk, keputusan, fill simulasi,
// respon exchange). Bukan persistence state: dedup & ledger tetap volatile.
// - Append ke file .jsonl lewat BufWriter.
// - Flush periodik tiap 1s dan tiap 1000 event.
// - Kalau tulis gagal, coba reopen file dan lanjut.
//
// Aktif hanya saat ENV `RECORD_FILE` di-set (lihat main.rs).

use std::path::Path;
use tokio::{
    fs::{self, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc,
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::{error, info};

use crate::domain::Event;

const FLUSH_EVERY_N_EVENTS: u32 = 1000;

async fn open_writer(path: &str) -> BufWriter<tokio::fs::File> {
    // Buat parent directory kalau belum ada
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = fs::create_dir_all(parent).await {
                error!(?e, %path, "recorder: create_dir_all failed");
            }
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .unwrap_or_else(|e| panic!("recorder: open {} failed: {}", path, e));

    BufWriter::new(file)
}

async fn write_line(
    writer: &mut BufWriter<tokio::fs::File>,
    path: &str,
    line: &str,
) -> Option<BufWriter<tokio::fs::File>> {
    let payload = format!("{line}\n");
    if let Err(e) = writer.write_all(payload.as_bytes()).await {
        error!(?e, "recorder: write failed, attempting reopen");
        let mut reopened = open_writer(path).await;
        if let Err(e2) = reopened.write_all(payload.as_bytes()).await {
            error!(?e2, "recorder: write failed again after reopen, drop event");
        }
        return Some(reopened);
    }
    None
}

pub async fn run(mut rx: mpsc::Receiver<Event>, path: String) {
    info!(%path, "recorder: started");
    let mut writer = open_writer(&path).await;

    let mut tick = interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut since_last_flush: u32 = 0;

    loop {
        tokio::select! {
            maybe_ev = rx.recv() => {
                match maybe_ev {
                    Some(ev) => {
                        let line = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                error!(?e, "recorder: serialize error, skip event");
                                continue;
                            }
                        };
                        if let Some(reopened) = write_line(&mut writer, &path, &line).await {
                            writer = reopened;
                        }

                        since_last_flush += 1;
                        if since_last_flush >= FLUSH_EVERY_N_EVENTS {
                            let _ = writer.flush().await;
                            since_last_flush = 0;
                        }
                    }
                    None => {
                        // Channel ditutup: flush lalu berhenti
                        let _ = writer.flush().await;
                        info!("recorder: channel closed, stopped");
                        break;
                    }
                }
            }

            _ = tick.tick() => {
                let _ = writer.flush().await;
                since_last_flush = 0;
            }
        }
    }
}
