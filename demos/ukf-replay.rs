use anyhow::{bail, Context, Result};
use ctrv_ukf::{Estimator, MeasurementPackage, NisAudit, SensorType, UkfConfig};

// 入力: タブ区切り
//   L  px   py     timestamp  [ground truth ...]
//   R  rho  phi  rho_dot  timestamp  [ground truth ...]
// 使い方: ukf-replay <input.txt> [output.csv] [config.json]

fn field(record: &csv::StringRecord, i: usize) -> Result<&str> {
    record
        .get(i)
        .map(str::trim)
        .with_context(|| format!("missing column {i}"))
}

fn parse_record(record: &csv::StringRecord) -> Result<MeasurementPackage> {
    let sensor_type = match field(record, 0)? {
        "L" => SensorType::Laser,
        "R" => SensorType::Radar,
        other => bail!("unknown sensor tag {other:?}"),
    };
    let n = sensor_type.dimension();
    let raw_measurements = (1..=n)
        .map(|i| -> Result<f64> { Ok(field(record, i)?.parse()?) })
        .collect::<Result<Vec<_>>>()?;
    let timestamp = field(record, n + 1)?.parse::<i64>()?;
    Ok(MeasurementPackage {
        sensor_type,
        timestamp,
        raw_measurements,
    })
}

fn load_config(path: Option<&String>) -> Result<UkfConfig> {
    let Some(path) = path else {
        return Ok(UkfConfig::default());
    };
    let file = std::fs::File::open(path).with_context(|| format!("open {path}"))?;
    let config: UkfConfig = serde_json::from_reader(file)?;
    Ok(config)
}

fn main() -> Result<()> {
    simple_logger::init_with_env()?;

    let args: Vec<String> = std::env::args().collect();
    let Some(input) = args.get(1) else {
        bail!("usage: {} <input.txt> [output.csv] [config.json]", args[0]);
    };
    let output = args
        .get(2)
        .cloned()
        .unwrap_or_else(|| "logs/ukf-replay.csv".to_string());
    let config = load_config(args.get(3))?;
    log::info!("config: {}", serde_json::to_string(&config)?);

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(input)
        .with_context(|| format!("open {input}"))?;
    if let Some(dir) = std::path::Path::new(&output).parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut wtr = csv::Writer::from_path(&output)?;
    wtr.write_record([
        "timestamp", "sensor", "px", "py", "v", "yaw", "yaw_rate", "nis",
    ])?;

    let mut ukf = Estimator::new(config)?;
    let mut audit = NisAudit::new();
    let mut rejected = 0;

    for (line, record) in rdr.records().enumerate() {
        let meas = parse_record(&record?).with_context(|| format!("line {}", line + 1))?;
        let est = match ukf.process_measurement(&meas) {
            Ok(est) => est,
            Err(e) => {
                // 1 周期分を捨てて続ける
                log::warn!("line {}: {e}", line + 1);
                rejected += 1;
                continue;
            }
        };
        if let Some(sample) = est.nis {
            audit.record(sample);
        }

        let x = est.x;
        print!("t: {:12} {:?}\t", est.timestamp, meas.sensor_type);
        println!(
            "x_est: ({:8.3},{:8.3},{:7.3},{:7.3},{:7.3}) p: ({:6.3},{:6.3})",
            x[0],
            x[1],
            x[2],
            x[3],
            x[4],
            est.p[(0, 0)],
            est.p[(1, 1)]
        );
        wtr.write_record(&[
            est.timestamp.to_string(),
            format!("{:?}", meas.sensor_type),
            x[0].to_string(),
            x[1].to_string(),
            x[2].to_string(),
            x[3].to_string(),
            x[4].to_string(),
            est.nis.map(|s| s.value.to_string()).unwrap_or_default(),
        ])?;
    }
    wtr.flush()?;

    for sensor in [SensorType::Laser, SensorType::Radar] {
        if let Some(summary) = audit.summary(sensor) {
            println!("{summary}");
        }
    }
    if rejected > 0 {
        println!("rejected records: {rejected}");
    }
    Ok(())
}
