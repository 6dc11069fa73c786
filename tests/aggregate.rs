mod common;

use common::*;
use rust_defect_metrics::analyze::{
    AggregateError, AggregateRow, Aggregator, ReportKind, ShaLookup, Value,
};
use rust_defect_metrics::model::{AnalysisSettings, Project};
use rust_defect_metrics::store::SnapshotStore;

fn kafka() -> Project {
    Project::new("p-kafka", "kafka")
}

async fn rows(store: &SnapshotStore, report: ReportKind) -> Vec<AggregateRow> {
    let settings = AnalysisSettings::default();
    Aggregator::new(store, &settings)
        .aggregate(report, &kafka())
        .await
        .unwrap()
}

async fn aggregate(store: &SnapshotStore, report: ReportKind) -> AggregateRow {
    let mut rows = rows(store, report).await;
    assert_eq!(rows.len(), 1, "{report}");
    rows.remove(0)
}

#[tokio::test]
async fn effect_partitions_eligible_commits() {
    let store = SnapshotBuilder::new()
        .project("kafka")
        .commit("kafka", commit("c1", 1))
        .commit("kafka", commit("c2", 2))
        .commit("kafka", commit("c3", 3))
        .touch("c1", "src/main/java/Broker.java", &["JL+R"])
        .touch("c2", "src/main/java/Log.java", &[])
        .touch("c3", "src/main/java/Topic.java", &[])
        .pull_request("kafka", merged("pr1", 1, 1))
        .link("pr1", Some("c1"))
        .link("pr1", Some("c2"))
        .build();

    let row = aggregate(&store, ReportKind::PullRequestEffect).await;
    assert_eq!(row.count("#cmt+pr+bi"), Some(1));
    assert_eq!(row.count("#cmt+pr-bi"), Some(1));
    assert_eq!(row.count("#cmt-pr+bi"), Some(0));
    assert_eq!(row.count("#cmt-pr-bi"), Some(1));
}

#[tokio::test]
async fn effect_skips_bot_and_non_source_commits() {
    let store = SnapshotBuilder::new()
        .project("kafka")
        .commit("kafka", commit("c1", 1))
        .commit("kafka", commit("c2", 2))
        .commit("kafka", commit("c3", 3))
        .commit("kafka", commit("c4", 4))
        .commit("kafka", commit("c5", 5))
        .touch("c1", "Broker.java", &["JL+R"])
        .touch("c2", "Log.java", &[])
        .touch("c3", "Topic.java", &[])
        .touch("c4", "pom.java", &["JL+R"])
        .touch("c5", "README.md", &["JL+R"])
        .pull_request("kafka", merged("pr1", 1, 1))
        .link("pr1", Some("c1"))
        .link("pr1", Some("c2"))
        .link_by("pr1", "c4", DEPENDABOT_ID)
        .build();

    let row = aggregate(&store, ReportKind::PullRequestEffect).await;
    assert_eq!(row.count("#cmt+pr+bi"), Some(1));
    assert_eq!(row.count("#cmt+pr-bi"), Some(1));
    assert_eq!(row.count("#cmt-pr+bi"), Some(0));
    assert_eq!(row.count("#cmt-pr-bi"), Some(1));
}

#[tokio::test]
async fn effect_uses_the_primary_variant() {
    let store = SnapshotBuilder::new()
        .project("kafka")
        .commit("kafka", commit("c1", 1))
        .touch("c1", "Broker.java", &["SZZ"])
        .build();
    let mut settings = AnalysisSettings::default();

    let rows = Aggregator::new(&store, &settings)
        .aggregate(ReportKind::PullRequestEffect, &kafka())
        .await
        .unwrap();
    assert_eq!(rows[0].count("#cmt-pr-bi"), Some(1));

    settings.primary_variant = "SZZ".parse().unwrap();
    let rows = Aggregator::new(&store, &settings)
        .aggregate(ReportKind::PullRequestEffect, &kafka())
        .await
        .unwrap();
    assert_eq!(rows[0].count("#cmt-pr+bi"), Some(1));
}

fn defects_store() -> SnapshotBuilder {
    SnapshotBuilder::new()
        .project("kafka")
        .commit("kafka", commit("c1", 1).with_label("validated_bugfix", true))
        .commit("kafka", commit("c3", 3))
        .commit("kafka", commit("c5", 5).with_label("adjustedszz_bugfix", true))
        .commit(
            "kafka",
            commit("c7", 7)
                .with_label("issueonly_bugfix", true)
                .with_revision("aaa"),
        )
        .touch("c5", "Log.java", &["SZZ"])
        .pull_request("kafka", merged("pr1", 1, 1))
        .link("pr1", Some("c1"))
        .link("pr1", None)
        .link("pr1", Some("c3"))
        .pull_request("kafka", merged("pr2", 2, 4))
        .link("pr2", Some("c5"))
        .pull_request("kafka", merged("pr3", 3, 6))
        .pull_request(
            "kafka",
            rust_defect_metrics::model::PullRequest::new("pr4", "", 4, at(8)).closed(),
        )
}

#[tokio::test]
async fn defects_exclude_partially_linked_pull_requests() {
    let store = defects_store().build();
    let row = aggregate(&store, ReportKind::PullRequestDefects).await;

    assert_eq!(row.count("#pr"), Some(4));
    assert_eq!(row.count("#mpr"), Some(3));
    assert_eq!(row.count("#rpr"), Some(1));
    assert_eq!(row.count("#mpr_all"), Some(1));
    assert_eq!(row.count("#mpr_partial"), Some(1));
    assert_eq!(row.count("#mpr_none"), Some(1));
    assert_eq!(row.count("#mpr_recovered"), Some(0));

    // pr1 holds a validated fix but its linkage is partial.
    assert_eq!(row.count("#bf_mpr"), Some(1));
    assert_eq!(row.count("#bf_mpr_a"), Some(1));
    assert_eq!(row.count("#bf_mpr_v"), Some(0));
    assert_eq!(row.count("#bi_mpr"), Some(1));
    assert_eq!(row.count("#bi_mpr_szz"), Some(1));
}

#[tokio::test]
async fn completeness_counters_sum_to_merged_pull_requests() {
    let store = defects_store().build();
    for report in [ReportKind::PullRequestBasics, ReportKind::PullRequestDefects] {
        let row = aggregate(&store, report).await;
        let sum = ["#mpr_all", "#mpr_partial", "#mpr_none"]
            .iter()
            .map(|name| row.count(name).unwrap())
            .sum::<u64>();
        assert_eq!(Some(sum), row.count("#mpr"), "{report}");
    }
}

#[tokio::test]
async fn lookup_recovers_only_fully_resolved_pull_requests() {
    let store = defects_store().build();
    let mut lookup = ShaLookup::default();
    lookup.insert("kafka", 3, vec!["aaa".to_string()]);
    lookup.insert("kafka", 1, vec!["aaa".to_string(), "zzz".to_string()]);
    let settings = AnalysisSettings::default();

    let row = Aggregator::new(&store, &settings)
        .with_lookup(Some(&lookup))
        .aggregate(ReportKind::PullRequestDefects, &kafka())
        .await
        .unwrap()
        .remove(0);

    assert_eq!(row.count("#mpr_recovered"), Some(1));
    assert_eq!(row.count("#mpr_partial"), Some(1));
    assert_eq!(row.count("#mpr_none"), Some(1));
    assert_eq!(row.count("#bf_mpr"), Some(2));
    assert_eq!(row.count("#bf_mpr_io"), Some(1));
    assert_eq!(row.count("#bf_mpr_if"), Some(1));
    assert_eq!(row.count("#bf_mpr_v"), Some(0));
}

#[tokio::test]
async fn commits_report_counts_unions_per_variant() {
    let store = SnapshotBuilder::new()
        .project("kafka")
        .commit("kafka", commit("c1", 1).with_label("validated_bugfix", true))
        .commit("kafka", commit("c2", 2))
        .commit("kafka", commit("c3", 3))
        .commit("kafka", commit("c4", 4))
        .touch("c1", "A.java", &["SZZ"])
        .touch("c1", "B.java", &["JL+R"])
        .touch("c2", "C.java", &["JL+R"])
        .touch("c4", "D.java", &["NOT-A-VARIANT"])
        .build();

    let row = aggregate(&store, ReportKind::Commits).await;
    assert_eq!(row.count("#cmt"), Some(4));
    assert_eq!(row.get("first_commit_date"), Some(&Value::Date(Some(at(1)))));
    assert_eq!(row.get("last_commit_date"), Some(&Value::Date(Some(at(4)))));
    assert_eq!(row.count("#bf_cmt"), Some(1));
    assert_eq!(row.count("#bf_cmt_v"), Some(1));
    assert_eq!(row.count("#bi_cmt"), Some(2));
    assert_eq!(row.count("#bi_cmt_szz"), Some(1));
    assert_eq!(row.count("#bi_cmt_jl+r"), Some(2));
    assert_eq!(row.count("#bi_cmt_jlmiv"), Some(0));
}

#[tokio::test]
async fn empty_project_yields_zero_counters_and_null_dates() {
    let store = SnapshotBuilder::new().project("kafka").build();

    let row = aggregate(&store, ReportKind::Commits).await;
    assert_eq!(row.count("#cmt"), Some(0));
    assert_eq!(row.count("#bi_cmt"), Some(0));
    assert_eq!(row.count("#bf_cmt"), Some(0));
    assert_eq!(row.get("first_commit_date"), Some(&Value::Date(None)));

    let row = aggregate(&store, ReportKind::PullRequestBasics).await;
    assert_eq!(row.count("#pr"), Some(0));
    assert_eq!(row.count("#pr_with_commit"), Some(0));
    assert_eq!(row.get("last_pr_date"), Some(&Value::Date(None)));
}

#[tokio::test]
async fn impact_cross_tabs_all_commits() {
    let store = SnapshotBuilder::new()
        .project("kafka")
        .commit("kafka", commit("c1", 1))
        .commit("kafka", commit("c2", 2))
        .commit("kafka", commit("c3", 3))
        .touch("c1", "README.md", &["SZZ"])
        .touch("c3", "Log.java", &["JL+R"])
        .pull_request("kafka", merged("pr1", 1, 1))
        .link("pr1", Some("c1"))
        .link("pr1", Some("c2"))
        .build();

    let row = aggregate(&store, ReportKind::PullRequestImpact).await;
    assert_eq!(row.count("#pr"), Some(1));
    assert_eq!(row.count("#mpr"), Some(1));
    assert_eq!(row.count("#cmt+pr+bi_all"), Some(1));
    assert_eq!(row.count("#cmt+pr-bi_all"), Some(1));
    assert_eq!(row.count("#cmt-pr+bi_all"), Some(1));
    assert_eq!(row.count("#cmt-pr-bi_all"), Some(0));
    assert_eq!(row.count("#cmt+pr+bi_szz"), Some(1));
    assert_eq!(row.count("#cmt-pr-bi_szz"), Some(1));
    assert_eq!(row.count("#cmt-pr+bi_szz"), Some(0));
    assert_eq!(row.count("#cmt-pr+bi_jl+r"), Some(1));
}

#[tokio::test]
async fn basics_count_pull_requests_and_histogram() {
    let store = SnapshotBuilder::new()
        .project("kafka")
        .commit("kafka", commit("c1", 1))
        .commit("kafka", commit("c2", 2))
        .commit("kafka", commit("c3", 10))
        .pull_request("kafka", merged("pr1", 1, 1))
        .link("pr1", Some("c1"))
        .link("pr1", Some("c2"))
        .pull_request("kafka", merged("pr2", 2, 2))
        .link("pr2", None)
        .pull_request("kafka", merged("pr3", 3, 20))
        .pull_request(
            "kafka",
            rust_defect_metrics::model::PullRequest::new("pr4", "", 4, at(25)),
        )
        .build();

    let row = aggregate(&store, ReportKind::PullRequestBasics).await;
    assert_eq!(row.count("#pr"), Some(4));
    assert_eq!(row.count("#mpr"), Some(3));
    assert_eq!(row.get("first_pr_date"), Some(&Value::Date(Some(at(1)))));
    assert_eq!(row.get("last_pr_date"), Some(&Value::Date(Some(at(25)))));
    assert_eq!(row.get("last_commit_date"), Some(&Value::Date(Some(at(10)))));
    assert_eq!(row.count("#pr_with_commit"), Some(2));
    assert_eq!(row.count("#mpr_all"), Some(1));
    assert_eq!(row.count("#mpr_none"), Some(2));
    assert_eq!(row.count("#mpr_2<=nc<=5"), Some(1));
    assert_eq!(row.count("#mpr_nc==0"), Some(0));
}

#[tokio::test]
async fn authors_collect_dependabot_creators() {
    let footer = format!("Bumps lodash.\n\n{DEPENDABOT_FOOTER}");
    let mut bot = merged("pr1", 1, 1);
    bot.title = Some("Bump lodash from 4.17.15 to 4.17.19".to_string());
    bot.description = Some(footer.clone());
    bot.creator_id = Some(DEPENDABOT_ID.to_string());
    let mut manual = merged("pr2", 2, 2);
    manual.title = Some("Bump version to 2.0".to_string());
    manual.description = Some("release".to_string());
    manual.creator_id = Some("human".to_string());
    let mut other = merged("pr3", 3, 3);
    other.title = Some("Bump jackson".to_string());
    other.description = Some(footer);
    other.creator_id = Some("other-bot".to_string());

    let store = SnapshotBuilder::new()
        .project("kafka")
        .pull_request("kafka", other)
        .pull_request("kafka", bot)
        .pull_request("kafka", manual)
        .build();

    let row = aggregate(&store, ReportKind::Authors).await;
    assert_eq!(row.count("#mpr"), Some(3));
    assert_eq!(row.count("#dependabot_mpr"), Some(2));
    assert_eq!(
        row.get("bot_ids"),
        Some(&Value::Text(Some(format!("{DEPENDABOT_ID},other-bot"))))
    );
}

fn features_store() -> SnapshotBuilder {
    let mut fork = merged("pr1", 7, 1);
    fork.source_repo_url = Some("https://api.github.com/repos/someone/kafka".to_string());
    fork.target_repo_url = Some("https://api.github.com/repos/apache/kafka".to_string());
    let mut upstream = merged("pr2", 8, 3);
    upstream.source_repo_url = Some("https://api.github.com/repos/apache/kafka".to_string());
    upstream.target_repo_url = Some("https://api.github.com/repos/apache/kafka".to_string());
    upstream.creator_id = Some(DEPENDABOT_ID.to_string());

    SnapshotBuilder::new()
        .project("kafka")
        .commit("kafka", commit("c1", 1).with_label("issueonly_bugfix", true))
        .commit("kafka", commit("c2", 2))
        .commit("kafka", commit("c3", 3))
        .touch("c1", "src/main/java/Broker.java", &[])
        .touch("c2", "src/test/java/BrokerTest.java", &["JL+R"])
        .touch("c3", "docs/README.md", &["SZZ"])
        .pull_request("kafka", fork)
        .link("pr1", Some("c1"))
        .link("pr1", None)
        .link("pr1", Some("c2"))
        .pull_request("kafka", upstream)
        .link("pr2", Some("c3"))
        .pull_request("kafka", merged("pr3", 9, 5))
        .link("pr3", None)
        .pull_request(
            "kafka",
            rust_defect_metrics::model::PullRequest::new("pr4", "", 10, at(6)).closed(),
        )
        .link("pr4", Some("c3"))
}

#[tokio::test]
async fn features_describe_each_merged_pull_request() {
    let store = features_store().build();
    let rows = rows(&store, ReportKind::PullRequestFeatures).await;

    // pr3 has no linked commit and pr4 was never merged.
    assert_eq!(
        rows.iter().map(|row| row.key().unwrap()).collect::<Vec<_>>(),
        vec!["pr1", "pr2"]
    );

    let fork = &rows[0];
    assert_eq!(fork.get("age"), Some(&Value::Number(Some(1440.0))));
    assert_eq!(fork.count("#commits"), Some(2));
    assert_eq!(fork.flag("bot"), Some(false));
    assert_eq!(fork.flag("code_change"), Some(true));
    assert_eq!(fork.flag("same_repository"), Some(false));
    assert_eq!(fork.flag("fix"), Some(true));
    assert_eq!(fork.flag("test"), Some(true));
    assert_eq!(fork.flag("buggy"), Some(true));
    assert_eq!(
        fork.get("url"),
        Some(&Value::Text(Some(
            "https://github.com/apache/kafka/pull/7".to_string()
        )))
    );

    let upstream = &rows[1];
    assert_eq!(upstream.count("#commits"), Some(1));
    assert_eq!(upstream.flag("bot"), Some(true));
    assert_eq!(upstream.flag("code_change"), Some(false));
    assert_eq!(upstream.flag("same_repository"), Some(true));
    assert_eq!(upstream.flag("fix"), Some(false));
    assert_eq!(upstream.flag("test"), Some(false));
    // SZZ alone is not the primary variant.
    assert_eq!(upstream.flag("buggy"), Some(false));
}

#[tokio::test]
async fn aggregation_is_idempotent() {
    let store = defects_store().build();
    for report in [
        ReportKind::Commits,
        ReportKind::PullRequestBasics,
        ReportKind::PullRequestDefects,
        ReportKind::PullRequestImpact,
        ReportKind::PullRequestFeatures,
    ] {
        assert_eq!(rows(&store, report).await, rows(&store, report).await);
    }
}

#[tokio::test]
async fn project_without_vcs_is_an_error() {
    let store = SnapshotBuilder::new().bare_project("kafka").build();
    let settings = AnalysisSettings::default();
    let err = Aggregator::new(&store, &settings)
        .aggregate(ReportKind::Commits, &kafka())
        .await
        .unwrap_err();
    assert!(matches!(err, AggregateError::MissingVcs(name) if name == "kafka"));
}
