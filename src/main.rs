//! eipkit adapter - reference EtherNet/IP target endpoint.
//!
//! Wires the assembly/identity/connection-manager objects into a message
//! router, starts the implicit-I/O runtime with its scheduler and watchdog,
//! and serves explicit messaging over TCP.

use eipkit_cip::{class, MessageRouter};
use eipkit_io::{ConnectionManager, IoRuntime, ProducerScheduler, Watchdog};
use eipkit_objects::{AssemblyObject, IdentityObject};
use eipkit_server::{Config, Server, ServerConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("failed to load config: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!("starting eipkit adapter");
    tracing::info!("  TCP bind: {}", config.network.bind_addr);
    tracing::info!("  UDP bind: {}", config.network.udp_bind_addr);

    // Application objects.
    let assemblies = Arc::new(AssemblyObject::new());
    if config.assemblies.is_empty() {
        // Nothing configured: expose one input and one output instance so
        // originators have something to open connections against.
        assemblies.register(100, 32);
        assemblies.register(150, 32);
        tracing::info!("  assemblies: defaults (100/32B, 150/32B)");
    } else {
        for assembly in &config.assemblies {
            assemblies.register(assembly.id, assembly.size);
            tracing::info!("  assembly {}: {} bytes", assembly.id, assembly.size);
        }
    }

    let mut identity = IdentityObject::new(
        config.identity.vendor_id,
        config.identity.product_code,
        config.identity.product_name.clone(),
    );
    identity.serial_number = config.identity.serial_number;

    // Implicit-I/O runtime and its loops.
    let runtime = IoRuntime::bind(config.network.udp_bind_addr).await?;
    let connmgr = Arc::new(ConnectionManager::new(
        Arc::clone(&runtime),
        Arc::clone(&assemblies),
    ));
    let scheduler = Arc::new(ProducerScheduler::new(Arc::clone(&runtime)));
    let watchdog = Arc::new(Watchdog::new(Arc::clone(&runtime)));

    // Message router.
    let router = Arc::new(MessageRouter::new());
    router.register(class::IDENTITY, Arc::new(identity));
    router.register(class::ASSEMBLY, Arc::clone(&assemblies) as Arc<dyn eipkit_cip::CipObject>);
    router.register(class::CONNECTION_MANAGER, connmgr);

    // Explicit-messaging server.
    let mut server_config = ServerConfig::new(config.network.bind_addr);
    server_config.max_connections = config.network.max_connections;
    let server = Arc::new(Server::bind(server_config, router).await?);

    let receiver_handle = tokio::spawn(IoRuntime::run_receiver(Arc::clone(&runtime)));
    let scheduler_handle = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run().await })
    };
    let watchdog_handle = {
        let watchdog = Arc::clone(&watchdog);
        tokio::spawn(async move { watchdog.run().await })
    };

    // Ctrl-c stops the server and the I/O loops.
    {
        let server = Arc::clone(&server);
        let runtime = Arc::clone(&runtime);
        let scheduler = Arc::clone(&scheduler);
        let watchdog = Arc::clone(&watchdog);
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("received shutdown signal");
            server.shutdown();
            scheduler.stop();
            watchdog.stop();
            runtime.shutdown();
        });
    }

    server.run().await?;

    let _ = scheduler_handle.await;
    let _ = watchdog_handle.await;
    let _ = receiver_handle.await;

    tracing::info!("adapter stopped");
    Ok(())
}
