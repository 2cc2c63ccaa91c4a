use crate::dataset;
use crate::error::{TrackerError, TrackerResult};
use crate::types::PositionSample;
use log::{info, warn};
use std::path::Path;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::Sender;
use tokio::time::{interval, Duration};

/// Failure reported by a sample source
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("Sample stream read failed: {0}")]
    Read(String),
    #[error("Malformed sample on line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// What a source delivers to the session, one at a time
#[derive(Clone, Debug, PartialEq)]
pub enum SampleEvent {
    Sample(PositionSample),
    Failed(SourceError),
    /// Finite source exhausted
    End,
}

/// Play a finite sample sequence, one sample per `period`.
///
/// A zero period delivers as fast as the receiver accepts. Returns the number
/// of samples delivered; stops early when the receiver is dropped.
pub async fn scripted_loop(
    samples: Vec<PositionSample>,
    period: Duration,
    tx: Sender<SampleEvent>,
) -> u64 {
    let mut ticker = if period.is_zero() {
        None
    } else {
        Some(interval(period))
    };
    let mut sent = 0u64;

    for sample in samples {
        if let Some(ticker) = ticker.as_mut() {
            ticker.tick().await;
        }

        if tx.send(SampleEvent::Sample(sample)).await.is_err() {
            info!("Playback stopped after {} samples", sent);
            return sent;
        }
        sent += 1;
    }

    let _ = tx.send(SampleEvent::End).await;
    sent
}

/// Read newline-delimited JSON samples until EOF or the first failure.
///
/// Blank lines are ignored. A read or parse error is delivered as
/// `SampleEvent::Failed` and ends the stream; EOF is delivered as `End`.
pub async fn live_loop<R>(reader: R, tx: Sender<SampleEvent>) -> u64
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0usize;
    let mut sent = 0u64;

    loop {
        let event = match lines.next_line().await {
            Ok(Some(line)) => {
                line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<PositionSample>(&line) {
                    Ok(sample) => SampleEvent::Sample(sample),
                    Err(e) => SampleEvent::Failed(SourceError::Parse {
                        line: line_no,
                        reason: e.to_string(),
                    }),
                }
            }
            Ok(None) => SampleEvent::End,
            Err(e) => SampleEvent::Failed(SourceError::Read(e.to_string())),
        };

        let terminal = !matches!(event, SampleEvent::Sample(_));
        if let SampleEvent::Failed(err) = &event {
            warn!("[live] {}", err);
        }

        if tx.send(event).await.is_err() {
            info!("[live] Channel closed after {} samples", sent);
            break;
        }
        if terminal {
            break;
        }
        sent += 1;
    }

    sent
}

/// Load a recorded drive: a JSON array or one sample per line, plain or gzip
pub fn load_scripted(path: &Path) -> TrackerResult<Vec<PositionSample>> {
    let text = dataset::read_text(path)?;
    let samples = parse_scripted(&text).map_err(|reason| TrackerError::DatasetFormat {
        path: path.to_path_buf(),
        reason,
    })?;

    if samples.is_empty() {
        return Err(TrackerError::EmptyDataset("sample"));
    }
    info!("Loaded {} samples from {}", samples.len(), path.display());
    Ok(samples)
}

fn parse_scripted(text: &str) -> Result<Vec<PositionSample>, String> {
    if text.trim_start().starts_with('[') {
        return serde_json::from_str(text).map_err(|e| e.to_string());
    }

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| format!("line {}: {}", i + 1, e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;
    use tokio::sync::mpsc;

    async fn drain(mut rx: mpsc::Receiver<SampleEvent>) -> Vec<SampleEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_scripted_preserves_order_and_ends() {
        let samples: Vec<PositionSample> = (0..5)
            .map(|i| PositionSample::new(i as f64, 35.0 + i as f64 * 0.001, 139.0))
            .collect();
        let (tx, rx) = mpsc::channel(2);

        let producer = tokio::spawn(scripted_loop(samples.clone(), Duration::from_millis(1), tx));
        let events = drain(rx).await;

        assert_eq!(producer.await.unwrap(), 5);
        assert_eq!(events.len(), 6);
        for (event, expected) in events.iter().zip(&samples) {
            assert_eq!(event, &SampleEvent::Sample(expected.clone()));
        }
        assert_eq!(events[5], SampleEvent::End);
    }

    #[tokio::test]
    async fn test_scripted_stops_when_receiver_dropped() {
        let samples = vec![PositionSample::new(0.0, 35.0, 139.0); 10];
        let (tx, mut rx) = mpsc::channel(1);

        let producer = tokio::spawn(scripted_loop(samples, Duration::ZERO, tx));
        assert!(matches!(rx.recv().await, Some(SampleEvent::Sample(_))));
        drop(rx);

        assert!(producer.await.unwrap() < 10);
    }

    #[tokio::test]
    async fn test_live_parses_lines() {
        let input = b"{\"timestamp\": 1, \"latitude\": 35.0, \"longitude\": 139.0, \"speed\": 20}\n\
                      \n\
                      {\"timestamp\": 2, \"latitude\": 35.001, \"longitude\": 139.0}\n";
        let (tx, rx) = mpsc::channel(8);

        let sent = live_loop(BufReader::new(&input[..]), tx).await;
        let events = drain(rx).await;

        assert_eq!(sent, 2);
        assert_eq!(events.len(), 3);
        match &events[0] {
            SampleEvent::Sample(s) => assert_eq!(s.speed, Some(20.0)),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(events[2], SampleEvent::End);
    }

    #[tokio::test]
    async fn test_live_stops_on_malformed_line() {
        let input = b"{\"timestamp\": 1, \"latitude\": 35.0, \"longitude\": 139.0}\n\
                      gps offline\n\
                      {\"timestamp\": 3, \"latitude\": 35.0, \"longitude\": 139.0}\n";
        let (tx, rx) = mpsc::channel(8);

        live_loop(BufReader::new(&input[..]), tx).await;
        let events = drain(rx).await;

        assert_eq!(events.len(), 2);
        match &events[1] {
            SampleEvent::Failed(SourceError::Parse { line, .. }) => assert_eq!(*line, 2),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_parse_scripted_formats() {
        let array = r#"[{"timestamp": 0, "latitude": 35.0, "longitude": 139.0},
                        {"timestamp": 1, "latitude": 35.1, "longitude": 139.0, "heading": 0}]"#;
        assert_eq!(parse_scripted(array).unwrap().len(), 2);

        let ndjson = "{\"timestamp\": 0, \"latitude\": 35.0, \"longitude\": 139.0}\n\n\
                      {\"timestamp\": 1, \"latitude\": 35.1, \"longitude\": 139.0}\n";
        assert_eq!(parse_scripted(ndjson).unwrap().len(), 2);

        let broken = "{\"timestamp\": 0, \"latitude\": 35.0, \"longitude\": 139.0}\n{oops}\n";
        assert!(parse_scripted(broken).unwrap_err().starts_with("line 2"));
    }

    #[test]
    fn test_load_scripted_file() {
        let path = std::env::temp_dir().join(format!("sapa_tracker_drive_{}.ndjson", std::process::id()));
        std::fs::write(&path, "{\"timestamp\": 0, \"latitude\": 35.0, \"longitude\": 139.0}\n").unwrap();
        assert_eq!(load_scripted(&path).unwrap().len(), 1);

        std::fs::write(&path, "\n").unwrap();
        assert!(matches!(load_scripted(&path), Err(TrackerError::EmptyDataset("sample"))));

        std::fs::remove_file(&path).ok();
    }
}
