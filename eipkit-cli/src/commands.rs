//! Command handlers.

use colored::Colorize;
use eipkit_cip::{class, DataType, EPath, MessageRouterRequest};
use eipkit_client::Client;
use eipkit_io::{
    ForwardCloseRequest, ForwardOpenRequest, ForwardOpenResponse, IoConnection, IoRuntime,
    ProducerScheduler,
};
use eipkit_objects::AssemblyObject;
use eipkit_protocol::hex::hexdump;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

type CliResult = Result<(), Box<dyn std::error::Error>>;

pub async fn identity(server: &str) -> CliResult {
    let mut client = Client::connect(server).await?;
    let items = client.list_identity().await?;
    for item in &items {
        println!("{}", item.product_name.as_str().bold());
        println!("  {} {:#06X}", "vendor:".dimmed(), item.vendor_id);
        println!("  {} {:#06X}", "device type:".dimmed(), item.device_type);
        println!("  {} {}", "product code:".dimmed(), item.product_code);
        println!(
            "  {} {}.{}",
            "revision:".dimmed(),
            item.revision_major,
            item.revision_minor
        );
        println!("  {} {:#06X}", "status:".dimmed(), item.status);
        println!("  {} {}", "serial:".dimmed(), item.serial_number);
        println!("  {} {}", "state:".dimmed(), item.state);
    }
    if items.is_empty() {
        println!("{}", "no identity items returned".yellow());
    }
    client.close().await?;
    Ok(())
}

pub async fn services(server: &str) -> CliResult {
    let mut client = Client::connect(server).await?;
    for item in client.list_services().await? {
        println!(
            "{}  version={} capabilities={:#06X}",
            item.name.bold(),
            item.version,
            item.capability_flags
        );
    }
    client.close().await?;
    Ok(())
}

pub async fn list_tags(server: &str) -> CliResult {
    let mut client = Client::connect(server).await?;
    let tags = client.list_tags().await?;
    for tag in &tags {
        println!(
            "{:<32} {:<12} {}",
            tag.name.as_str().bold(),
            tag.data_type.to_string(),
            format!("instance {}", tag.instance_id).dimmed()
        );
    }
    println!("{} tags", tags.len());
    client.close().await?;
    Ok(())
}

fn print_value(type_code: DataType, bytes: &[u8]) {
    let base = type_code.base();
    let rendered = if base == DataType::BOOL {
        bytes.first().map(|b| (*b != 0).to_string())
    } else if base == DataType::SINT {
        bytes.first().map(|b| (*b as i8).to_string())
    } else if base == DataType::INT {
        bytes
            .get(..2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]).to_string())
    } else if base == DataType::DINT {
        bytes
            .get(..4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]).to_string())
    } else if base == DataType::LINT {
        bytes.get(..8).map(|b| {
            i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]).to_string()
        })
    } else if base == DataType::REAL {
        bytes
            .get(..4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]).to_string())
    } else if base == DataType::LREAL {
        bytes.get(..8).map(|b| {
            f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]).to_string()
        })
    } else {
        None
    };

    match rendered {
        Some(value) => println!("{} {} = {}", type_code.to_string().dimmed(), "value".dimmed(), value.bold()),
        None => print!("{} raw:\n{}", type_code.to_string().dimmed(), hexdump(bytes)),
    }
}

pub async fn read_tag(server: &str, tag: &str) -> CliResult {
    let mut client = Client::connect(server).await?;
    let data = client.read_tag(tag).await?;
    if data.len() < 2 {
        println!("{}", "response too short for a type code".red());
    } else {
        let type_code = DataType(u16::from_le_bytes([data[0], data[1]]));
        print_value(type_code, &data[2..]);
    }
    client.close().await?;
    Ok(())
}

pub async fn write_tag(server: &str, tag: &str, type_name: &str, value: &str) -> CliResult {
    let mut client = Client::connect(server).await?;
    match type_name.to_ascii_lowercase().as_str() {
        "bool" => {
            let parsed = matches!(value, "1" | "true" | "on");
            client.write_tag_value(tag, &parsed).await?
        }
        "sint" => client.write_tag_value(tag, &value.parse::<i8>()?).await?,
        "int" => client.write_tag_value(tag, &value.parse::<i16>()?).await?,
        "dint" => client.write_tag_value(tag, &value.parse::<i32>()?).await?,
        "lint" => client.write_tag_value(tag, &value.parse::<i64>()?).await?,
        "real" => client.write_tag_value(tag, &value.parse::<f32>()?).await?,
        "lreal" => client.write_tag_value(tag, &value.parse::<f64>()?).await?,
        other => return Err(format!("unsupported type '{}'", other).into()),
    }
    println!("{} {} = {}", "wrote".green(), tag.bold(), value);
    client.close().await?;
    Ok(())
}

pub async fn read_timer(server: &str, tag: &str) -> CliResult {
    let mut client = Client::connect(server).await?;
    let timer = client.read_timer(tag).await?;
    println!("{}", tag.bold());
    println!("  PRE {} ms, ACC {} ms", timer.pre, timer.acc);
    println!("  EN={} TT={} DN={}", timer.en, timer.tt, timer.dn);
    client.close().await?;
    Ok(())
}

pub async fn read_counter(server: &str, tag: &str) -> CliResult {
    let mut client = Client::connect(server).await?;
    let counter = client.read_counter(tag).await?;
    println!("{}", tag.bold());
    println!("  PRE {}, ACC {}", counter.pre, counter.acc);
    println!(
        "  CU={} CD={} DN={} OV={} UN={}",
        counter.cu, counter.cd, counter.dn, counter.ov, counter.un
    );
    client.close().await?;
    Ok(())
}

pub struct ScanOptions {
    pub output_assembly: u16,
    pub input_assembly: u16,
    pub rpi_ms: u64,
    pub size: usize,
    pub duration: u64,
    pub udp_port: u16,
}

/// Opens a cyclic connection, produces O->T frames at the RPI for the
/// requested duration, then closes.
pub async fn scan(server: &str, options: ScanOptions) -> CliResult {
    let mut client = Client::connect(server).await?;
    let rpi = Duration::from_millis(options.rpi_ms);

    let mut path = EPath::new();
    path.add_class(class::ASSEMBLY);
    path.add_instance(options.output_assembly as u32);
    path.add_connection_point(options.input_assembly);

    let ot_connection_id = 0x1000_0001;
    let open = ForwardOpenRequest {
        priority_time_tick: 0x0A,
        timeout_ticks: 249,
        ot_connection_id,
        to_connection_id: 0,
        connection_serial: 0x1234,
        vendor_id: 0x1337,
        originator_serial: std::process::id(),
        timeout_mult: 1,
        ot_rpi: rpi.as_micros() as u32,
        ot_net_params: 0x4200 | (options.size as u32 + 6),
        to_rpi: rpi.as_micros() as u32,
        to_net_params: 0x4200 | (options.size as u32 + 6),
        transport_trigger: 0x01,
        path: path.as_bytes().to_vec(),
        large: false,
    };

    let request = MessageRouterRequest::new(
        eipkit_cip::service::FORWARD_OPEN,
        EPath::to_object(class::CONNECTION_MANAGER, 1, 0),
        open.encode().freeze(),
    );
    let response = client.session().send_cip_request(&request).await?;
    response.cip_error()?;
    let opened = ForwardOpenResponse::decode(&response.data)?;
    println!(
        "{} O->T {:#010X}  T->O {:#010X}",
        "Forward_Open ok".green(),
        opened.ot_connection_id,
        opened.to_connection_id
    );

    // Local runtime produces O->T frames to the target's I/O port.
    let target_ip: IpAddr = server
        .split(':')
        .next()
        .unwrap_or(server)
        .parse()
        .unwrap_or_else(|_| "127.0.0.1".parse().expect("loopback parses"));
    let target_udp = SocketAddr::new(target_ip, options.udp_port);

    let assemblies = Arc::new(AssemblyObject::new());
    let output = assemblies.register(options.output_assembly as u32, options.size);

    let runtime = IoRuntime::bind("0.0.0.0:0".parse().expect("wildcard parses")).await?;
    runtime.add_connection(
        IoConnection::new(ot_connection_id, rpi)
            .producing()
            .with_run_idle_header(true)
            .with_assembly(output)
            .with_remote_addr(target_udp),
    );

    let scheduler = Arc::new(ProducerScheduler::new(Arc::clone(&runtime)));
    let handle = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run().await })
    };

    println!(
        "producing to {} every {} ms for {} s",
        target_udp, options.rpi_ms, options.duration
    );
    tokio::time::sleep(Duration::from_secs(options.duration)).await;

    scheduler.stop();
    let _ = handle.await;

    let close = ForwardCloseRequest {
        priority_time_tick: 0x0A,
        timeout_ticks: 249,
        connection_serial: 0x1234,
        vendor_id: 0x1337,
        originator_serial: std::process::id(),
        path: path.as_bytes().to_vec(),
    };
    let request = MessageRouterRequest::new(
        eipkit_cip::service::FORWARD_CLOSE,
        EPath::to_object(class::CONNECTION_MANAGER, 1, 0),
        close.encode().freeze(),
    );
    client.session().send_cip_request(&request).await?.cip_error()?;
    println!("{}", "Forward_Close ok".green());

    client.close().await?;
    Ok(())
}
