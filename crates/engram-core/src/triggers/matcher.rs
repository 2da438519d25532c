use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};

use super::braces::expand_braces;
use crate::error::CoreError;
use crate::model::{Manifest, TriggerConfig};

/// The channel a conversational turn arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    User,
    Agent,
}

/// A single conversational turn to test triggers against.
#[derive(Debug, Clone, Copy)]
pub struct Turn<'a> {
    pub channel: Channel,
    pub text: &'a str,
}

impl<'a> Turn<'a> {
    pub fn user(text: &'a str) -> Self {
        Self {
            channel: Channel::User,
            text,
        }
    }

    pub fn agent(text: &'a str) -> Self {
        Self {
            channel: Channel::Agent,
            text,
        }
    }
}

/// Compiled form of a [`TriggerConfig`]: one case-insensitive alternation per
/// channel. A channel with no patterns never fires.
///
/// Matching is by substring, not word boundary: a pattern `go` fires inside
/// `mango`. Short patterns over-match; authors should prefer longer phrases.
#[derive(Debug, Clone, Default)]
pub struct CompiledTrigger {
    user: Option<Regex>,
    agent: Option<Regex>,
    any: Option<Regex>,
}

impl CompiledTrigger {
    /// True if no channel has a pattern.
    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.agent.is_none() && self.any.is_none()
    }

    /// A turn hits if its own channel's patterns or the any-channel patterns
    /// match.
    pub fn matches(&self, turn: &Turn<'_>) -> bool {
        let channel = match turn.channel {
            Channel::User => &self.user,
            Channel::Agent => &self.agent,
        };
        [channel, &self.any]
            .into_iter()
            .flatten()
            .any(|re| re.is_match(turn.text))
    }
}

/// Compile a rule set. Patterns are brace-expanded, then every literal is
/// escaped and joined into one case-insensitive alternation per channel.
pub fn compile_context_trigger(config: &TriggerConfig) -> Result<CompiledTrigger, CoreError> {
    Ok(CompiledTrigger {
        user: compile_channel(&config.user_msg)?,
        agent: compile_channel(&config.agent_msg)?,
        any: compile_channel(&config.any_msg)?,
    })
}

fn compile_channel(patterns: &[String]) -> Result<Option<Regex>, CoreError> {
    let mut literals: Vec<String> = patterns
        .iter()
        .flat_map(|p| expand_braces(p))
        .filter(|lit| !lit.is_empty())
        .map(|lit| regex::escape(&lit))
        .collect();
    if literals.is_empty() {
        return Ok(None);
    }
    literals.sort();
    literals.dedup();

    RegexBuilder::new(&literals.join("|"))
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| CoreError::Trigger(e.to_string()))
}

/// Per-engram disclosure/activation decision.
#[derive(Debug, Clone, Default)]
pub struct ContextTriggerMatcher {
    disclosure: CompiledTrigger,
    activation: CompiledTrigger,
}

impl ContextTriggerMatcher {
    pub fn new(
        disclosure: Option<&TriggerConfig>,
        activation: Option<&TriggerConfig>,
    ) -> Result<Self, CoreError> {
        let compile = |c: Option<&TriggerConfig>| match c {
            Some(c) => compile_context_trigger(c),
            None => Ok(CompiledTrigger::default()),
        };
        Ok(Self {
            disclosure: compile(disclosure)?,
            activation: compile(activation)?,
        })
    }

    pub fn from_manifest(manifest: &Manifest) -> Result<Self, CoreError> {
        Self::new(
            manifest.disclosure_triggers.as_ref(),
            manifest.activation_triggers.as_ref(),
        )
    }

    /// No triggers at all: disclosed and activated on every turn.
    pub fn is_permanent(&self) -> bool {
        self.disclosure.is_empty() && self.activation.is_empty()
    }

    /// Disclosed when it has no disclosure rules, when a disclosure rule hits,
    /// or when it is being activated.
    pub fn should_disclose(&self, turn: &Turn<'_>) -> bool {
        self.disclosure.is_empty() || self.disclosure.matches(turn) || self.should_activate(turn)
    }

    /// Activated on every turn when permanent. With only disclosure rules it
    /// is never auto-activated; the host loads it on request.
    pub fn should_activate(&self, turn: &Turn<'_>) -> bool {
        if self.activation.is_empty() {
            return self.disclosure.is_empty();
        }
        self.activation.matches(turn)
    }
}

/// Compile every manifest's rules once, keyed by engram name.
pub fn build_context_trigger_matchers<'a, I>(
    manifests: I,
) -> Result<BTreeMap<String, ContextTriggerMatcher>, CoreError>
where
    I: IntoIterator<Item = &'a Manifest>,
{
    manifests
        .into_iter()
        .map(|m| Ok((m.name.clone(), ContextTriggerMatcher::from_manifest(m)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(user: &[&str], agent: &[&str], any: &[&str]) -> TriggerConfig {
        let v = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect();
        TriggerConfig {
            user_msg: v(user),
            agent_msg: v(agent),
            any_msg: v(any),
        }
    }

    fn manifest(
        name: &str,
        disclosure: Option<TriggerConfig>,
        activation: Option<TriggerConfig>,
    ) -> Manifest {
        Manifest {
            name: name.into(),
            description: "This is a sufficiently long description for testing.".into(),
            version: None,
            disclosure_triggers: disclosure,
            activation_triggers: activation,
            wrap: None,
        }
    }

    #[test]
    fn test_channel_specific_match() {
        let matcher = ContextTriggerMatcher::new(Some(&config(&["deploy"], &[], &[])), None).unwrap();
        assert!(matcher.should_disclose(&Turn::user("please deploy this")));
        assert!(!matcher.should_disclose(&Turn::agent("please deploy this")));
    }

    #[test]
    fn test_any_channel_matches_both() {
        let matcher =
            ContextTriggerMatcher::new(Some(&config(&["deploy"], &[], &["deploy"])), None).unwrap();
        assert!(matcher.should_disclose(&Turn::user("please deploy this")));
        assert!(matcher.should_disclose(&Turn::agent("please deploy this")));
    }

    #[test]
    fn test_case_insensitive_substring() {
        let trigger = compile_context_trigger(&config(&["Deploy"], &[], &[])).unwrap();
        assert!(trigger.matches(&Turn::user("REDEPLOYING now")));
        // Substring semantics: short patterns fire inside longer words.
        let trigger = compile_context_trigger(&config(&["go"], &[], &[])).unwrap();
        assert!(trigger.matches(&Turn::user("I like mango")));
    }

    #[test]
    fn test_braces_expand_before_matching() {
        let trigger = compile_context_trigger(&config(&["build.{sh,ts}"], &[], &[])).unwrap();
        assert!(trigger.matches(&Turn::user("run build.ts")));
        assert!(trigger.matches(&Turn::user("run build.sh")));
        assert!(!trigger.matches(&Turn::user("run build.py")));
    }

    #[test]
    fn test_duplicate_literals_compile_once() {
        let trigger =
            compile_context_trigger(&config(&["{a,b{1,2}}", "b1"], &[], &[])).unwrap();
        let user = trigger.user.as_ref().unwrap();
        assert_eq!(user.as_str(), "a|b1|b2");
        assert!(trigger.matches(&Turn::user("plan b2")));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let trigger = compile_context_trigger(&config(&["a.b", "(x)"], &[], &[])).unwrap();
        assert!(trigger.matches(&Turn::user("see a.b")));
        assert!(!trigger.matches(&Turn::user("see aXb")));
        assert!(trigger.matches(&Turn::user("call (x)")));
    }

    #[test]
    fn test_malformed_braces_match_literally() {
        let trigger = compile_context_trigger(&config(&["fn{a,b"], &[], &[])).unwrap();
        assert!(trigger.matches(&Turn::user("fn{a,b here")));
        assert!(!trigger.matches(&Turn::user("fna")));
    }

    #[test]
    fn test_empty_config_never_fires() {
        let trigger = compile_context_trigger(&TriggerConfig::default()).unwrap();
        assert!(trigger.is_empty());
        assert!(!trigger.matches(&Turn::user("anything")));
    }

    #[test]
    fn test_permanent_without_triggers() {
        let matcher = ContextTriggerMatcher::from_manifest(&manifest("p", None, None)).unwrap();
        assert!(matcher.is_permanent());
        for turn in [Turn::user(""), Turn::agent(""), Turn::user("hello")] {
            assert!(matcher.should_disclose(&turn));
            assert!(matcher.should_activate(&turn));
        }
    }

    #[test]
    fn test_disclosure_only_is_not_auto_activated() {
        let matcher = ContextTriggerMatcher::new(Some(&config(&["deploy"], &[], &[])), None).unwrap();
        assert!(!matcher.should_activate(&Turn::user("deploy")));
        assert!(!matcher.should_disclose(&Turn::user("hello")));
    }

    #[test]
    fn test_activation_implies_disclosure() {
        let matcher = ContextTriggerMatcher::new(
            Some(&config(&["deploy"], &[], &[])),
            Some(&config(&[], &["kubectl"], &[])),
        )
        .unwrap();
        let turn = Turn::agent("running kubectl apply");
        assert!(matcher.should_activate(&turn));
        assert!(matcher.should_disclose(&turn));
    }

    #[test]
    fn test_activation_only_is_always_disclosed() {
        let matcher =
            ContextTriggerMatcher::new(None, Some(&config(&[], &[], &["terraform"]))).unwrap();
        assert!(matcher.should_disclose(&Turn::user("hello")));
        assert!(!matcher.should_activate(&Turn::user("hello")));
        assert!(matcher.should_activate(&Turn::user("terraform plan")));
    }

    #[test]
    fn test_build_matchers_by_name() {
        let manifests = vec![
            manifest("perm", None, None),
            manifest("gated", Some(config(&["deploy"], &[], &[])), None),
        ];
        let matchers = build_context_trigger_matchers(&manifests).unwrap();
        assert_eq!(matchers.len(), 2);
        assert!(matchers["perm"].should_disclose(&Turn::user("x")));
        assert!(!matchers["gated"].should_disclose(&Turn::user("x")));
        assert!(matchers["gated"].should_disclose(&Turn::user("deploy it")));
    }
}
