use signalpost_core::{ContentType, RandomSource};

const POST_TEMPLATES: &[&str] = &[
    "{topic} is moving fast today. What's your read on where it goes next?",
    "Keeping a close eye on {topic}. Fundamentals matter more than the noise.",
    "Quick thought on {topic}: patience usually beats hype.",
    "Everyone is talking about {topic}. The better question is what changes next week.",
    "{topic} update: volatility rewards the people who did their homework.",
];

const THREAD_TEMPLATES: &[&str] = &[
    "A short thread on {topic} 🧵\n\n1/ Why it matters right now",
    "Let's break down {topic} step by step. 1/",
    "Three things to know about {topic} this week. A thread 1/",
];

const REPLY_TEMPLATES: &[&str] = &[
    "Great point on {topic}! Thanks for sharing this.",
    "Interesting take on {topic}. Curious to see how it plays out.",
    "Appreciate the mention! {topic} is definitely worth watching.",
    "Agreed, {topic} deserves more attention than it gets.",
];

const MEME_TEMPLATES: &[&str] = &[
    "Me checking {topic} every five minutes like it owes me money",
    "Nobody:\nAbsolutely nobody:\nMe at 3am: reading about {topic}",
    "{topic} holders explaining the dip to their family at dinner",
];

pub fn templates_for(content_type: ContentType) -> &'static [&'static str] {
    match content_type {
        ContentType::Post => POST_TEMPLATES,
        ContentType::Thread => THREAD_TEMPLATES,
        ContentType::Reply => REPLY_TEMPLATES,
        ContentType::Meme => MEME_TEMPLATES,
    }
}

/// Picks a template for `content_type` and fills in the topic. Length is not
/// enforced here.
pub fn render_template(content_type: ContentType, topic: &str, random: &dyn RandomSource) -> String {
    let table = templates_for(content_type);
    let template = table[random.below(table.len())];
    let topic = topic.trim();
    let topic = if topic.is_empty() { "this" } else { topic };
    template.replace("{topic}", topic)
}
