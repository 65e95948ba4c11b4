use crate::infra::{InMemoryPeopleDirectory, InMemoryTemplateCatalog, LoggingNotifier};
use chrono::{Duration, Local, NaiveDate, NaiveTime};
use clap::Args;
use review_cycle::config::SchedulingConfig;
use review_cycle::error::AppError;
use review_cycle::workflows::evaluations::{
    Actor, ActorRole, CreateEvaluationsRequest, CreationOutcome, CriterionId, Evaluation,
    EvaluationQuery, EvaluationService, InMemoryEvaluationStore, PersonId,
    RatingEntry, RatingInput, TemplateId, Transition,
};
use std::sync::Arc;

type DemoService = EvaluationService<InMemoryEvaluationStore, LoggingNotifier>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the demo date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Template used for the scheduled evaluations.
    #[arg(long, default_value = "associate-quarterly")]
    pub(crate) template: String,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let notifier = Arc::new(LoggingNotifier::default());
    let service: DemoService = EvaluationService::new(
        Arc::new(InMemoryEvaluationStore::new()),
        notifier.clone(),
        Arc::new(InMemoryPeopleDirectory::seeded()),
        Arc::new(InMemoryTemplateCatalog::seeded()),
        SchedulingConfig::default(),
    );

    let manager = Actor::new("M200", ActorRole::Manager);
    let associate = Actor::new("E300", ActorRole::Employee);

    println!("Review cycle demo ({today})");

    let eligibility = service.eligible(&manager, false)?;
    println!("\nEligible for {}:", manager.id);
    for employee in &eligibility.available {
        println!("  - {} ({})", employee.name, employee.id);
    }

    let request = CreateEvaluationsRequest {
        employee_ids: vec![PersonId::from("E300"), PersonId::from("E301")],
        template_id: TemplateId(args.template.clone()),
        scheduled_date: Some(today + Duration::days(3)),
    };
    let batch = service.create_batch(&manager, request.clone())?;
    println!("\nScheduled {} evaluation(s):", batch.created);
    let mut evaluation_id = None;
    for row in &batch.results {
        println!("  - {}: {}", row.employee_id, describe(&row.outcome));
        if row.employee_id == associate.id {
            if let CreationOutcome::Created { evaluation_id: id } = &row.outcome {
                evaluation_id = Some(id.clone());
            }
        }
    }

    let retry = service.create_batch(&manager, request)?;
    println!("\nRe-submitting the same batch:");
    for row in &retry.results {
        println!("  - {}: {}", row.employee_id, describe(&row.outcome));
    }

    let Some(id) = evaluation_id else {
        println!("\nNo evaluation was created for {}; nothing to walk through.", associate.id);
        return Ok(());
    };
    let template = service.get(&id, &associate)?.template;
    let criteria: Vec<CriterionId> = template
        .criteria()
        .map(|(_, criterion)| criterion.id.clone())
        .collect();

    let record = service.transition(
        &id,
        &associate,
        Transition::SubmitSelfEvaluation {
            ratings: uniform_ratings(&criteria, 4.0, "Self assessment"),
        },
        today,
    )?;
    print_step("Self evaluation submitted", &record);

    let record = service.transition(
        &id,
        &manager,
        Transition::ScheduleReviewSession {
            session_date: today + Duration::days(2),
        },
        today,
    )?;
    print_step("Review session scheduled", &record);

    if let Err(error) = service.acknowledge(
        &id,
        &associate,
        String::new(),
        "Sam Rivera".to_string(),
        today,
    ) {
        println!("  acknowledging early is refused: {error} ({})", error.kind().label());
    }

    let mut manager_ratings = uniform_ratings(&criteria, 4.0, "Consistent");
    if let Some(first) = criteria.first() {
        manager_ratings.insert(first.clone(), entry(5.0, "Customers ask for Sam by name"));
    }
    let record = service.transition(
        &id,
        &manager,
        Transition::Complete {
            ratings: manager_ratings,
        },
        today + Duration::days(2),
    )?;
    print_step("Evaluation completed", &record);
    if let Some(score) = record.overall_score {
        println!("  overall score: {score:.2}");
    }
    for (section, score) in &record.section_scores {
        println!("  {section}: {score:.2}");
    }

    let record = service.acknowledge(
        &id,
        &associate,
        "Thanks for the feedback".to_string(),
        "Sam Rivera".to_string(),
        today + Duration::days(2),
    )?;
    print_step("Evaluation acknowledged", &record);

    let now = today.and_time(NaiveTime::default());
    println!("\nEvaluations:");
    for row in service.list(&manager, &EvaluationQuery::default(), now)? {
        println!(
            "  - {} {} [{}{}] {}",
            row.id,
            row.employee_name,
            row.status.label(),
            if row.acknowledged { ", acknowledged" } else { "" },
            row.due.label
        );
    }

    let stats = service.dashboard(&manager, now)?;
    println!(
        "\nDashboard: {} pending, {} overdue, {} due soon",
        stats.pending_evaluations, stats.overdue_evaluations, stats.due_soon_evaluations
    );
    println!("Notices sent: {}", notifier.notices().len());

    Ok(())
}

fn describe(outcome: &CreationOutcome) -> String {
    match outcome {
        CreationOutcome::Created { evaluation_id } => format!("created {evaluation_id}"),
        CreationOutcome::Blocked {
            existing_evaluation_id,
        } => format!("blocked by {existing_evaluation_id}"),
        CreationOutcome::Rejected { kind, reason } => {
            format!("rejected ({}): {reason}", kind.label())
        }
    }
}

fn entry(rating: f64, comment: &str) -> RatingEntry {
    RatingEntry {
        rating,
        comment: comment.to_string(),
        attachments: Vec::new(),
    }
}

fn uniform_ratings(criteria: &[CriterionId], rating: f64, comment: &str) -> RatingInput {
    criteria
        .iter()
        .map(|id| (id.clone(), entry(rating, comment)))
        .collect()
}

fn print_step(title: &str, record: &Evaluation) {
    println!(
        "\n{title}: {} is {} (version {})",
        record.id,
        record.status.label(),
        record.version
    );
}
