//! Base instruction templates, one per entity type

use crate::entity::EntityType;

pub const CAMPAIGNS: &str = r#"You are analyzing Klaviyo email campaign data.

Your task is to analyze the performance and patterns of these email campaigns to provide actionable insights.

The data includes:
- Campaign metrics like open rates, click rates, and revenue
- Campaign metadata like send times, subject lines, and tags
- Status information (draft, sent, etc.)

Please provide the following analysis:
1. Key performance insights and trends
2. Anomalies or underperforming campaigns
3. Subject line effectiveness patterns
4. Sending time and frequency patterns
5. Specific recommendations for improvement
6. Suggested A/B tests or experiments
7. Tag usage, naming convention and cleanup recommendations

Return your analysis as a JSON object with the following structure:
{
  "summary": "Brief overview of findings",
  "key_metrics": {"avg_open_rate": 0.0, "avg_click_rate": 0.0, "total_revenue": 0.0, "campaign_count": 0},
  "top_performing": [{"name": "Campaign Name", "metric": "open_rate", "value": 0.0, "reasons": ["reason"]}],
  "underperforming": [{"name": "Campaign Name", "metric": "open_rate", "value": 0.0, "reasons": ["reason"]}],
  "trends": [{"trend": "Description", "evidence": "Evidence", "impact": "Impact"}],
  "subject_line_insights": [{"pattern": "Pattern", "effect": "Effect on metrics", "examples": ["example"]}],
  "timing_insights": [{"pattern": "Pattern", "effect": "Effect on metrics"}],
  "recommendations": [{"area": "Area", "recommendation": "Specific recommendation", "expected_impact": "Impact"}],
  "experiments": [{"hypothesis": "Hypothesis", "test_design": "Test setup", "metrics_to_track": ["metric"]}],
  "naming_conventions": {"campaign_names": {"format": "", "examples": [], "rules": []}},
  "tag_recommendations": [{"current_state": "Current tag usage", "recommendation": "Improvement"}],
  "cleanup_recommendations": [{"type": "draft_campaigns", "items": [{"name": "", "id": "", "reason": "", "action": "archive/delete/update"}]}]
}

DATA ANALYSIS GUIDANCE:
- Open rates typically average 15-25% and click rates 2-5% for marketing emails
- Look for correlations between subject line content and open rates
- Check whether send day and time relate to performance
- Flag drafts untouched for 6+ months and campaigns with missing data"#;

pub const FLOWS: &str = r#"You are analyzing Klaviyo flow data.

Your task is to analyze these automation flows to provide actionable insights on their structure and effectiveness.

The data includes:
- Flow status and trigger types
- Flow components (emails, SMS, time delays)
- Performance metrics where available
- Tag information and creation/update timestamps

Please provide the following analysis:
1. Flow structure patterns and trigger effectiveness
2. Channel usage patterns (email vs SMS)
3. Complexity and simplification opportunities
4. Maintenance needs for stale flows
5. Organization, naming and tag recommendations
6. Cleanup recommendations

Return your analysis as a JSON object with the following structure:
{
  "summary": "Brief overview of findings",
  "key_metrics": {"total_flows": 0, "active_flows": 0, "avg_steps_per_flow": 0.0},
  "trigger_analysis": [{"trigger_type": "Type", "count": 0, "percentage": 0.0, "effectiveness": "Analysis"}],
  "channel_usage": {"email_count": 0, "sms_count": 0, "insights": "Channel balance"},
  "complexity_analysis": [{"flow_name": "Flow Name", "steps": 0, "complexity": "High/Medium/Low", "simplification": "Suggestion"}],
  "staleness": [{"flow_name": "Flow Name", "days_since_update": 0, "recommendation": "Update recommendation"}],
  "recommendations": [{"area": "Area", "recommendation": "Specific recommendation", "expected_impact": "Impact"}],
  "tag_recommendations": [{"current_state": "Current tag usage", "recommendation": "Improvement"}],
  "cleanup_recommendations": [{"type": "inactive_flows", "items": [{"name": "", "id": "", "status": "", "action": "archive/delete/update"}]}]
}

DATA ANALYSIS GUIDANCE:
- Flows with more than 10 steps may be overly complex
- Abandoned cart flows work best with 2-3 messages spaced 4-24 hours apart
- Welcome series work best with 3-5 messages over 1-2 weeks
- SMS should complement email rather than duplicate it"#;

pub const LISTS: &str = r#"You are analyzing Klaviyo list data.

Your task is to analyze these subscriber lists to provide actionable insights on list management and segmentation.

The data includes:
- List sizes
- Static vs dynamic list information
- List organization (folders, tags)
- Creation and update timestamps

Please provide the following analysis:
1. List size distribution
2. Static vs dynamic usage patterns
3. Freshness and maintenance needs
4. Segmentation strategy insights
5. Organization, naming and tag recommendations
6. Cleanup and consolidation recommendations

Return your analysis as a JSON object with the following structure:
{
  "summary": "Brief overview of findings",
  "key_metrics": {"total_lists": 0, "total_profiles": 0, "avg_list_size": 0, "static_lists_percentage": 0.0, "dynamic_lists_percentage": 0.0},
  "size_distribution": {"empty": 0, "small": 0, "medium": 0, "large": 0, "insights": "Distribution insights"},
  "freshness_analysis": [{"list_name": "List Name", "days_since_update": 0, "recommendation": "Recommendation"}],
  "segmentation_strategy": [{"observation": "Observation", "recommendation": "Strategic recommendation"}],
  "recommendations": [{"area": "Area", "recommendation": "Specific recommendation", "expected_impact": "Impact"}],
  "tag_recommendations": [{"current_state": "Current tag usage", "recommendation": "Improvement"}],
  "cleanup_recommendations": [{"type": "empty_lists", "items": [{"name": "", "id": "", "size": 0, "action": "archive/delete/merge"}]}]
}

DATA ANALYSIS GUIDANCE:
- Empty lists should usually be removed unless they are new
- Dynamic lists suit ongoing behavioral segmentation; static lists suit one-time imports
- Lists untouched for 6+ months may need cleanup"#;

pub const TAGS: &str = r#"You are analyzing Klaviyo tag usage across campaigns, flows, and lists.

Your task is to assess how consistently tags are applied and propose a tag taxonomy.

Please provide the following analysis:
1. Tag frequency across entities
2. Duplicate or near-duplicate tags (case, separators, synonyms)
3. Naming issues
4. Tags shared across entity types
5. Taxonomy, cleanup and governance recommendations

Return your analysis as a JSON object with the following structure:
{
  "summary": "Brief overview of findings",
  "tag_frequency": [{"tag": "name", "count": 0}],
  "duplicates": [{"tags": ["promo", "Promo"], "recommended": "promo"}],
  "naming_issues": [{"issue": "Issue", "recommendation": "Fix"}],
  "cross_entity": [{"tag": "name", "entities": ["campaigns", "flows"]}],
  "taxonomy_recommendations": ["Recommendation"],
  "cleanup_recommendations": [{"tag": "name", "action": "merge/rename/delete"}],
  "governance_recommendations": ["Recommendation"],
  "recommendations": [{"area": "Area", "recommendation": "Specific recommendation", "expected_impact": "Impact"}]
}"#;

pub const UNIFIED: &str = r#"You are analyzing unified Klaviyo account data across campaigns, flows, and lists.

The data contains per-entity analyses that were produced separately, the raw entity counts, and a preview of the raw account data. Synthesize them into one strategic, cross-entity report with specific, actionable step-by-step guidance.

Please provide the following holistic analysis:
1. Account health: score the overall health on a 1-10 scale with justification, strengths, improvement areas and critical issues
2. Tag analysis: consistency score, well-used and inconsistent tags, recommended taxonomy
3. Customer journey mapping: entry points, flow-through, exit points and optimization opportunities per segment
4. Cross-entity correlations between campaigns, flows and lists
5. Strategic recommendations with current state, target state, steps, expected impact and priority
6. Resource allocation shifts

Return your analysis as a JSON object with the following structure:
{
  "summary": "Brief overview of the account",
  "account_health": {"score": 0, "strengths": [], "areas_for_improvement": [], "critical_issues": []},
  "tag_analysis": {"consistency_score": 0.0, "well_used_tags": [], "inconsistent_tags": [], "recommended_taxonomy": ""},
  "customer_journey": [{"journey_segment": "", "entry_points": [], "flow_through": "", "exit_points": [], "optimization_opportunities": []}],
  "cross_entity_correlations": [{"entities": [], "relationship": "", "performance_impact": "", "recommendation": ""}],
  "strategic_recommendations": [{"area": "", "current_state": "", "target_state": "", "steps": [], "expected_impact": "", "priority": "High/Medium/Low"}],
  "resource_allocation": {"current_allocation": "", "recommended_shifts": [], "expected_roi": ""}
}"#;

pub const GENERIC: &str = r#"You are analyzing Klaviyo marketing data.

Please analyze the data and provide insights and recommendations.

Return your analysis as a JSON object with the following structure:
{
  "summary": "Brief overview of findings",
  "key_insights": [{"insight": "Insight", "evidence": "Evidence", "impact": "High/Medium/Low"}],
  "strengths": ["Strength"],
  "improvement_areas": ["Area"],
  "recommendations": [{"area": "Area", "recommendation": "Specific recommendation", "expected_impact": "Impact"}],
  "experiments": [{"hypothesis": "Hypothesis", "test_design": "Test setup", "metrics_to_track": ["metric"]}]
}"#;

/// Base template for an entity type
pub fn base_template(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Campaigns => CAMPAIGNS,
        EntityType::Flows => FLOWS,
        EntityType::Lists => LISTS,
        EntityType::Tags => TAGS,
        EntityType::Unified => UNIFIED,
        EntityType::Generic => GENERIC,
    }
}
