use pitcrush_battery::{BatteryPlan, FollowUp, TestSpec, Tier};

pub fn run() {
    println!("Tests (small tier parameters):\n");
    for key in TestSpec::KEYS {
        let Some(spec) = TestSpec::default_for(key) else {
            continue;
        };
        println!("  {key:<10} {:<18} {spec}", spec.name());
    }

    println!("\nTiers:\n");
    for tier in Tier::ALL {
        let plan = BatteryPlan::for_tier(tier);
        let samples: u64 = plan
            .tests
            .iter()
            .map(|t| {
                let s = t.sampling();
                (s.n * s.replications) as u64
            })
            .sum();
        let replications = plan.tests.first().map(|t| t.sampling().replications).unwrap_or(0);
        println!(
            "  {:<8} {} tests, N = {replications}, {samples} observations in total",
            tier.name(),
            plan.tests.len()
        );
    }

    println!("\nFollow-ups after the battery (crush, unless --no-follow-ups):\n");
    for follow_up in FollowUp::defaults(1.0) {
        println!(
            "  {:<10} {:<18} {}",
            follow_up.distribution.name(),
            follow_up.spec.name(),
            follow_up.spec
        );
    }
}
