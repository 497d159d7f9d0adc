use stress_test::{stress_test_contended, stress_test_likes, stress_test_scaling};
use tracing_subscriber::EnvFilter;
pub mod stress_test;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async_main())?;
    Ok(())
}

async fn async_main() -> plateful_sdk::Result<()> {
    println!("\n\n╔════════════════════════════════════════════════════════════╗");
    println!("║            ASYNC TOGGLE STRESS TESTS                        ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let mut all_converged = true;

    // Test 1: few entities, many taps each
    let stats = stress_test_likes(4, 50, 20).await?;
    stats.print();
    all_converged &= stats.all_converged();

    // Test 2: many entities, slow server
    let stats = stress_test_likes(25, 20, 80).await?;
    stats.print();
    all_converged &= stats.all_converged();

    // Test 3: other clients fighting over the same likes
    let stats = stress_test_contended(10, 30, 20).await?;
    stats.print();
    all_converged &= stats.all_converged();

    // Test 4: Scaling analysis
    stress_test_scaling(20, 5).await?;

    if all_converged {
        println!("\n✓ All stress tests converged!");
    } else {
        println!("\n✗ Some entities did not converge, see statistics above");
    }
    Ok(())
}
