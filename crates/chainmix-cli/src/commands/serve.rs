use chainmix_server::Settings;

pub fn run(host: &str, port: u16, rpc_url: Option<String>, no_auto_draw: bool) -> i32 {
    let mut settings = Settings::from_env();
    if let Some(url) = rpc_url {
        settings.rpc_url = url;
    }
    if no_auto_draw {
        settings.auto_draw = false;
    }

    let base = format!("http://{host}:{port}");
    println!("ChainMix RNG v{}", chainmix_core::VERSION);
    println!("   {base}");
    println!("   RPC: {}", settings.rpc_url);
    println!("   History: {}", settings.store_dir.display());
    if settings.auto_draw {
        println!(
            "   Auto draw: every {}s",
            settings.auto_draw_interval.as_secs()
        );
    }
    println!();
    println!("   Endpoints:");
    println!("     POST /draws/solana              Run a draw");
    println!("     GET  /draws/current             Latest draw id");
    println!("     GET  /draws/{{id}}/stream         Live SSE events");
    println!("     POST /entropy/{{id}}/user         Submit hex entropy");
    println!("     GET  /history                   Past draws");
    println!("     POST /range/by-seed             Unbiased range sample");
    println!("     POST /tests/bitstream/by-seed   Bit-stream download");
    println!();
    println!("   Example:");
    println!(
        "     curl -X POST {base}/draws/solana -H 'content-type: application/json' \\"
    );
    println!("          -d '{{\"draw_id\":\"demo\",\"blocks\":3,\"collect_ms\":2000}}'");
    println!();

    let rt = tokio::runtime::Runtime::new().unwrap();
    match rt.block_on(chainmix_server::run_server(settings, host, port)) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("server error: {e}");
            1
        }
    }
}
