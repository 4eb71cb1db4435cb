use crate::infra::Marketplace;
use clap::Args;
use gig_market::config::SyncConfig;
use gig_market::error::AppError;
use gig_market::marketplace::{
    Actor, ApplicationService, ApplicationStatus, EmployerId, InMemoryStore, Job, NewJob, WorkerId,
};
use gig_market::scoring::{
    score_breakdown, IdentityDetails, LocationDetails, ScoreBreakdown, WorkerProfile,
};
use gig_market::sync::{ApplicationsSource, RefreshOutcome, ViewSynchronizer};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Dashboard poll interval for the sync session, in milliseconds
    #[arg(long, default_value_t = 200)]
    pub(crate) poll_ms: u64,
    /// Delay before refetching after a mutation, in milliseconds
    #[arg(long, default_value_t = 50)]
    pub(crate) settle_ms: u64,
    /// Skip the dashboard sync session
    #[arg(long)]
    pub(crate) skip_sync: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Worker profile JSON file
    pub(crate) profile: PathBuf,
}

pub(crate) fn run_score_report(args: ScoreArgs) -> Result<(), AppError> {
    let file = File::open(&args.profile)?;
    let profile: WorkerProfile = serde_json::from_reader(file).map_err(std::io::Error::from)?;
    println!("Shakti score for {}", profile.worker_id);
    render_breakdown(&score_breakdown(&profile));
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let marketplace = Marketplace::in_memory();
    let service = &marketplace.service;
    let employer_id = EmployerId("emp-demo-farms".to_string());
    let employer = Actor::Employer(employer_id.clone());

    println!("Gig marketplace demo");

    println!("\n1. Applying twice to the same job");
    let harvest = post(service, &employer_id, "Grape harvest crew", 1)?;
    let asha = WorkerId("wkr-asha".to_string());
    let first = service.submit(&harvest.id, &asha)?;
    println!("  {} applied: {}", asha, first.status);
    match service.submit(&harvest.id, &asha) {
        Ok(_) => println!("  Second application unexpectedly accepted"),
        Err(err) => println!("  Second application rejected ({}): {}", err.kind(), err),
    }

    println!("\n2. Accepting and selecting the applicant");
    let accepted = service.set_status(&first.id, ApplicationStatus::Accepted, &employer)?;
    println!("  Application {} is {}", accepted.id, accepted.status);
    let selected = service.select_final(&first.id, &employer)?;
    println!(
        "  Final selection: {}, job is now {}",
        selected.is_final_selection,
        service.job(&harvest.id)?.status
    );

    println!("\n3. Selecting a second applicant on the same job");
    let pruning = post(service, &employer_id, "Vineyard pruning", 2)?;
    let ravi = service.submit(&pruning.id, &WorkerId("wkr-ravi".to_string()))?;
    let kavya = service.submit(&pruning.id, &WorkerId("wkr-kavya".to_string()))?;
    for id in [&ravi.id, &kavya.id] {
        service.set_status(id, ApplicationStatus::Accepted, &employer)?;
    }
    service.select_final(&ravi.id, &employer)?;
    match service.select_final(&kavya.id, &employer) {
        Ok(_) => println!("  Second selection unexpectedly accepted"),
        Err(err) => println!("  Second selection rejected ({}): {}", err.kind(), err),
    }

    println!("\n4. Worker cancelling an accepted application");
    match service.cancel(&kavya.id, &Actor::Worker(kavya.worker_id.clone())) {
        Ok(_) => println!("  Cancellation unexpectedly accepted"),
        Err(err) => println!("  Cancellation rejected ({}): {}", err.kind(), err),
    }

    println!("\n5. Completing the work");
    service.set_status(&first.id, ApplicationStatus::InProgress, &employer)?;
    let completed = service.mark_complete(&first.id, &employer)?;
    println!(
        "  Application {} is {}, completed at {}, payment {}",
        completed.id,
        completed.status,
        completed
            .completed_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "-".to_string()),
        completed
            .payment_status
            .map(|status| format!("{status:?}").to_lowercase())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("  Job {} is {}", harvest.id, service.job(&harvest.id)?.status);

    println!("\n6. Shakti score for a sparse profile");
    let mut profile = WorkerProfile::empty(asha.clone());
    profile.identity = IdentityDetails {
        has_full_name: true,
        has_phone: true,
        ..IdentityDetails::default()
    };
    profile.location = LocationDetails {
        has_city: true,
        ..LocationDetails::default()
    };
    render_breakdown(&score_breakdown(&profile));

    if !args.skip_sync {
        let config = SyncConfig {
            poll_interval: Duration::from_millis(args.poll_ms.max(1)),
            settle_delay: Duration::from_millis(args.settle_ms),
        };
        sync_session(service, &employer_id, config).await?;
    }

    Ok(())
}

async fn sync_session(
    service: &Arc<ApplicationService<InMemoryStore>>,
    employer_id: &EmployerId,
    config: SyncConfig,
) -> Result<(), AppError> {
    println!("\nDashboard sync session");
    let job = post(service, employer_id, "Cold storage loading", 1)?;
    let worker = WorkerId("wkr-meena".to_string());
    let application = service.submit(&job.id, &worker)?;

    let dashboard = Arc::new(ViewSynchronizer::new(
        Arc::new(ApplicationsSource::worker_dashboard(
            Arc::clone(service),
            worker.clone(),
            None,
        )),
        config,
    ));
    let applicants = Arc::new(ViewSynchronizer::new(
        Arc::new(ApplicationsSource::job_applicants(
            Arc::clone(service),
            job.id.clone(),
        )),
        config,
    ));

    describe("worker dashboard mounted", &dashboard.mount().await);
    describe("employer dashboard mounted", &applicants.mount().await);
    let mut updates = dashboard.subscribe();
    updates.borrow_and_update();

    service.set_status(
        &application.id,
        ApplicationStatus::Accepted,
        &Actor::Employer(employer_id.clone()),
    )?;
    describe(
        "employer dashboard after accepting",
        &applicants.refetch_after_mutation().await,
    );

    if updates.changed().await.is_ok() {
        let state = updates.borrow_and_update().clone();
        let statuses: Vec<String> = state
            .data
            .unwrap_or_default()
            .iter()
            .map(|application| application.status.to_string())
            .collect();
        println!(
            "  Worker dashboard picked up the change on its next poll: [{}] (revision {})",
            statuses.join(", "),
            state.revision.unwrap_or_default()
        );
    }
    println!(
        "  Fetches issued: worker {}, employer {}",
        dashboard.fetch_count(),
        applicants.fetch_count()
    );

    dashboard.teardown();
    applicants.teardown();
    Ok(())
}

fn post(
    service: &ApplicationService<InMemoryStore>,
    employer_id: &EmployerId,
    title: &str,
    workers_needed: u32,
) -> Result<Job, AppError> {
    let job = service.post_job(
        employer_id,
        NewJob {
            title: title.to_string(),
            company_name: Some("Demo Farms".to_string()),
            location: Some("Nashik".to_string()),
            salary: Some(650),
            workers_needed,
        },
    )?;
    Ok(job)
}

fn describe(label: &str, outcome: &RefreshOutcome) {
    match outcome {
        RefreshOutcome::Failed(err) => println!("  {label}: failed ({err})"),
        other => println!("  {label}: {other:?}"),
    }
}

fn render_breakdown(breakdown: &ScoreBreakdown) {
    println!("  Total: {}/100", breakdown.total);
    for component in &breakdown.components {
        println!(
            "  - {:?}: {}/{} {}",
            component.category, component.points, component.cap, component.notes
        );
    }
}
