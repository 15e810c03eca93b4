//! Built-in prompt set embedded directly in the binary (§4.B: "DB-backed
//! source is out of scope; in-memory embedding is fine"). One template per
//! `TaskKey`-shaped operation; every `${var}` used below is declared in its
//! frontmatter so `PromptRegistry::render` never rejects a legitimate call.

use factharbor_prompts::{InMemoryTemplateSource, PromptRegistry, RawTemplate, TemplateFrontmatter};
use std::sync::Arc;

fn tpl(pipeline: &str, variables: &[&str], content: &str) -> RawTemplate {
    RawTemplate {
        content: content.to_string(),
        frontmatter: TemplateFrontmatter {
            version: 1,
            pipeline: pipeline.to_string(),
            variables: variables.iter().map(|s| s.to_string()).collect(),
            required_sections: vec![],
        },
    }
}

/// The fixed prompt set a job is constructed with. Swapping this for a
/// file- or DB-backed `TemplateSource` is a drop-in change at the call site
/// (persistence itself is out of scope, spec.md §1).
pub fn default_prompt_registry() -> Arc<PromptRegistry> {
    let source = InMemoryTemplateSource::new()
        .with_template(
            "claim.classify_input",
            tpl(
                "cb",
                &["inputText"],
                "Classify this input as single_atomic_claim or multi_assertion_input, derive an \
                 impliedClaim strictly from the text, and produce a first-cut claim list.\n\n\
                 Input: ${inputText}",
            ),
        )
        .with_template(
            "claim.refine",
            tpl(
                "cb",
                &["inputText", "topicSignal", "firstCutClaims"],
                "Refine each candidate claim: assign centrality, claimRole, isCentral, \
                 checkWorthiness, keyEntities. Never treat \"Study X found Y\" as a central \
                 claim. If the input is a question, reframe it into its explicit assertion \
                 only — never infer multiplicity beyond what the question states. Do not use \
                 any source URL or full evidence text, only the topic signal below.\n\n\
                 Input: ${inputText}\nTopic signal: ${topicSignal}\nCandidates: ${firstCutClaims}",
            ),
        )
        .with_template(
            "research.query_generate",
            tpl(
                "cb",
                &["claimText", "mode"],
                "Generate search queries for this claim in ${mode} mode. In pro_con mode, \
                 label each query supporting or refuting.\n\nClaim: ${claimText}",
            ),
        )
        .with_template(
            "research.relevance_classify",
            tpl(
                "cb",
                &["claimText", "hitTitle", "hitSnippet"],
                "Rate 0-1 how relevant this search hit is to the claim.\n\nClaim: \
                 ${claimText}\nTitle: ${hitTitle}\nSnippet: ${hitSnippet}",
            ),
        )
        .with_template(
            "research.evidence_extract",
            tpl(
                "cb",
                &["claimText", "hitTitle", "hitSnippet", "hitUrl"],
                "Extract one EvidenceItem from this hit: statement, sourceExcerpt, \
                 sourceAuthority, evidenceBasis, sourceType, category, probativeValue, \
                 claimDirection, derivativeClaimUnverified.\n\nClaim: ${claimText}\nTitle: \
                 ${hitTitle}\nSnippet: ${hitSnippet}\nURL: ${hitUrl}",
            ),
        )
        .with_template(
            "boundary.cluster",
            tpl(
                "cb",
                &["claimsJson", "evidenceJson"],
                "Derive candidate AnalysisContexts (institution, jurisdiction, methodology, \
                 boundaries, geographic, temporal) for this evidence set.\n\nClaims: \
                 ${claimsJson}\nEvidence: ${evidenceJson}",
            ),
        )
        .with_template(
            "boundary.context_assign",
            tpl(
                "cb",
                &["evidenceJson", "contextsJson"],
                "Assign each evidence item to exactly one contextId from the candidate set, \
                 or CTX_GENERAL if cross-cutting, or CTX_UNSCOPED if uninferable. Populate \
                 each item's evidenceScope.\n\nEvidence: ${evidenceJson}\nContexts: \
                 ${contextsJson}",
            ),
        )
        .with_template(
            "debate.advocate",
            tpl(
                "cb",
                &["claimText", "evidenceJson"],
                "Produce an initial verdict strictly grounded in this evidence subset: \
                 answerPct, confidencePct, shortAnswer, keyFactors citing evidence ids.\n\n\
                 Claim: ${claimText}\nEvidence: ${evidenceJson}",
            ),
        )
        .with_template(
            "debate.self_consistency",
            tpl(
                "cb",
                &["claimText", "evidenceJson", "candidateAnswerPct"],
                "Resample the advocate verdict twice more and consolidate; report a \
                 consistencyScore and the consolidated verdict.\n\nClaim: ${claimText}\n\
                 Evidence: ${evidenceJson}\nCandidate answerPct: ${candidateAnswerPct}",
            ),
        )
        .with_template(
            "debate.challenge",
            tpl(
                "cb",
                &["claimText", "evidenceJson", "candidateAnswerPct", "keyFactorsJson"],
                "Generate adversarial challenge points against this verdict. Every challenge \
                 must cite at least one existing evidence id.\n\nClaim: ${claimText}\n\
                 Evidence: ${evidenceJson}\nCandidate answerPct: ${candidateAnswerPct}\n\
                 Key factors: ${keyFactorsJson}",
            ),
        )
        .with_template(
            "debate.reconcile",
            tpl(
                "cb",
                &["claimText", "candidateAnswerPct", "challengesJson"],
                "Reconcile the advocate verdict against the surviving challenges; produce a \
                 reconciled verdict and one challengeResponse per surviving challenge.\n\n\
                 Claim: ${claimText}\nCandidate answerPct: ${candidateAnswerPct}\nChallenges: \
                 ${challengesJson}",
            ),
        )
        .with_template(
            "debate.validate",
            tpl(
                "cb",
                &["claimText", "candidateAnswerPct", "keyFactorsJson"],
                "Validate: every keyFactor must reference a real evidence id. Check reasoning \
                 and answerPct agree (flag isInverted if not, suggest correctedAnswerPct). Set \
                 harmPotential and isContested/factualBasis.\n\nClaim: ${claimText}\n\
                 Candidate answerPct: ${candidateAnswerPct}\nKey factors: ${keyFactorsJson}",
            ),
        )
        .with_template(
            "verdict.narrative",
            tpl(
                "cb",
                &["claimsJson", "verdictsJson"],
                "Write a grounded narrative paragraph per context plus an overall summary, \
                 citing claim ids.\n\nClaims: ${claimsJson}\nVerdicts: ${verdictsJson}",
            ),
        );

    Arc::new(PromptRegistry::new(Arc::new(source)))
}
