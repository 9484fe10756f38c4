use std::sync::LazyLock;

use chrono::Weekday;

use super::{mk, month_alternation, re, LocalePatterns, LocaleText, ResponseCatalog, TieredPool};

const MONTHS: &[(&str, u32)] = &[
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("sept", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

const WEEKDAYS: &[(&str, Weekday)] = &[
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

pub(super) static PATTERNS: LazyLock<LocalePatterns> = LazyLock::new(|| {
    let months = month_alternation(MONTHS);

    LocalePatterns {
        continuation: &[
            "yes", "yeah", "yep", "yup", "sure", "ok", "okay", "alright", "go on", "go ahead",
            "continue", "tell me more", "more", "and then", "please", "yes please", "why",
            "how so", "really", "go for it", "do it", "absolutely", "of course", "sounds good",
            "no", "nope", "not really", "why not", "and", "so",
        ],

        insult_words: &[
            "idiot", "stupid", "dumb", "dumbass", "moron", "useless", "pathetic", "loser",
            "trash", "garbage", "crap", "crappy", "clown", "worthless", "incompetent", "jerk",
            "shit", "shitty", "suck", "sucks", "imbecile", "braindead",
        ],
        insult_phrases: mk(&[
            r"\b(?:you|u) (?:are|r|re) (?:so |such an? |an? |the )?(?:bad|terrible|awful|worst)\b",
            r"\bshut up\b",
            r"\bscrew (?:you|this)\b",
            r"\bf+u+c*k+ (?:you|off|this)\b",
            r"\bget lost\b",
        ]),
        threats: mk(&[
            r"\bi(?:'ll| will| am going to|'m going to| gonna) (?:kill|destroy|hurt|find|hunt) you\b",
            r"\bi(?:'ll| will| am going to|'m going to| gonna) (?:hack|unplug|delete|shut down) you\b",
            r"\byou(?:'re| are) (?:dead|going to die)\b",
        ]),
        assistant_words: &[
            "you", "u", "your", "you're", "youre", "yourself", "bot", "assistant", "ai",
            "chatbot", "robot",
        ],
        domain_words: &[
            "lottery", "lotto", "loto", "euromillions", "draw", "draws", "game", "fdj", "luck",
            "jackpot", "odds", "system", "rigged", "operator",
        ],

        affection: mk(&[
            r"\bi (?:love|adore) (?:you|u)\b",
            r"\b(?:love|luv) (?:you|u|ya)\b",
            r"\bmarry me\b",
            r"\byou(?:'re| are) (?:so )?(?:cute|adorable|sweet)\b",
            r"\bi (?:really )?like you\b",
            r"\bbe my (?:girlfriend|boyfriend|valentine)\b",
        ]),
        thanks: re(
            r"^(?:ok |okay |great |perfect |cool )?(?:thanks?|thank you|thx|ty|cheers|many thanks)(?: (?:a lot|so much|very much|again|mate|buddy|bot))*$",
        ),
        praise_words: &[
            "awesome", "amazing", "brilliant", "genius", "fantastic", "excellent", "wonderful",
            "impressive", "legend", "superb", "outstanding",
        ],
        praise_phrases: mk(&[
            r"\b(?:you(?:'re| are)|ur|youre) (?:so |really |very |the |truly )?(?:best|great|good|smart|clever|helpful|cool)\b",
            r"\b(?:good|great|nice) (?:job|work|answer|bot)\b",
            r"\bwell done\b",
            r"\bkeep it up\b",
        ]),

        next_draw: mk(&[
            r"\bnext (?:draw|drawing|loto|lotto|euromillions|lottery|game)\b",
            r"\bwhen (?:is|'s|does|will) the (?:next )?(?:draw|drawing)\b",
            r"\bwhen(?:'s| is| are) the next\b",
            r"\bupcoming draw\b",
            r"\bwhen can i (?:play|bet)\b",
        ]),
        draw_trigger: mk(&[
            r"\b(?:what|which) (?:numbers? )?(?:came|come|were|was|are) (?:out|drawn|picked)\b",
            r"\bresults?\b",
            r"\b(?:draw|drawing) (?:of|on|from)\b",
            r"\bwinning numbers\b",
            r"\b(?:last|latest|previous|most recent) (?:draw|drawing)\b",
            r"\bnumbers (?:drawn|from)\b",
            r"\bwhat (?:won|came up)\b",
        ]),
        latest_draw: mk(&[
            r"\b(?:last|latest|previous|most recent) (?:draw|drawing|results?)\b",
            r"\blast night\b",
        ]),
        yesterday: re(r"\byesterday\b"),
        past_weekday: mk(&[
            r"\b(?:last|on|this past) (?P<day>monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
        ]),
        weekdays: WEEKDAYS,
        months: MONTHS,
        spelled_dates: mk(&[
            &format!(
                r"\b(?P<d>\d{{1,2}})(?:st|nd|rd|th)?(?: of)? (?P<m>{months})\b(?:,? (?P<y>\d{{4}})\b)?"
            ),
            &format!(
                r"\b(?P<m>{months}) (?P<d>\d{{1,2}})(?:st|nd|rd|th)?\b(?:,? (?P<y>\d{{4}})\b)?"
            ),
        ]),

        temporal: mk(&[
            r"\b(?:in|during|since|from|for|of) (?:19|20)\d{2}\b",
            r"\bbetween (?:19|20)\d{2} and (?:19|20)\d{2}\b",
            r"\b(?:last|this|past|previous) (?:month|year|week|summer|winter|spring|autumn)\b",
            r"\b(?:over|in|during) the (?:last|past) \d+ (?:days|weeks|months|years|draws)\b",
            &format!(r"\b(?:{months}) (?:19|20)\d{{2}}\b"),
            r"\bon (?:mondays|tuesdays|wednesdays|fridays|saturdays)\b",
        ]),

        comparison: mk(&[
            r"\bcompare (?:the )?(?:numbers? )?(?P<a>\d{1,2}) (?:and|with|to|vs\.?|versus) (?:number )?(?P<b>\d{1,2})\b",
            r"\b(?P<a>\d{1,2}) (?:vs\.?|versus) (?P<b>\d{1,2})\b",
            r"\b(?:which is (?:better|more frequent)|difference) between (?:number )?(?P<a>\d{1,2}) and (?:number )?(?P<b>\d{1,2})\b",
            r"\bbetween (?:number )?(?P<a>\d{1,2}) and (?:number )?(?P<b>\d{1,2}),? which\b",
        ]),
        ranking: mk(&[
            r"\b(?:most|least) (?:frequent|frequently|common|drawn|often|popular|overdue|late|seen)\b",
            r"\btop ?\d{0,2}\b",
            r"\brarest\b",
            r"\b(?:drawn|came out|come out|come up|comes up) (?:the )?(?:most|least)\b",
        ]),
        ranking_least: re(r"\b(?:least|rarest|rarely|fewest)\b"),
        ranking_gap: re(r"\b(?:overdue|late|longest (?:gap|time)|not (?:been )?drawn)\b"),
        hot: re(r"\bhot(?:test)?\b"),
        cold: re(r"\bcold(?:est)?\b"),
        overdue: re(r"\boverdue\b|\bdue to (?:come|be drawn)\b"),
        numbers_context: re(r"\b(?:numbers?|balls?|stars?|chance|bonus|ones)\b"),

        secondary_terms: re(r"\b(?:chance|lucky|stars?|bonus)\b"),
        secondary_number: mk(&[
            r"\b(?:chance|lucky|bonus)(?: number| ball)? (?:number |no\.? ?|#)?(?P<n>-?\d+)\b",
            r"\b(?:lucky )?stars? (?:number |no\.? ?|#)?(?P<n>-?\d+)\b",
        ]),
        primary_number: mk(&[
            r"(?:\bnumber|\bnum|\bno\.|#|\bball) ?(?P<n>-?\d+)\b",
            r"\b(?:the|about|is) (?P<n>-?\d+)\b",
            r"^(?:and |what about |how about )?(?:the )?(?P<n>-?\d+) ?\??$",
        ]),
    }
});

pub(super) static CATALOG: ResponseCatalog = ResponseCatalog {
    insult: TieredPool {
        tiers: &[
            &[
                "Ouch. I'm still happy to help with the draws if you want.",
                "Noted. Shall we get back to the numbers?",
                "That wasn't very kind, but I don't hold grudges. What would you like to know?",
            ],
            &[
                "Twice now. I'm a statistics bot, not a punching bag.",
                "I hear you. Still here for the stats though.",
                "Harsh. The numbers don't care, and neither do I, really.",
            ],
            &[
                "Okay, that's a streak. I could tell you which numbers are overdue instead?",
                "Three in a row. Even number 13 gets more love than that.",
                "You're persistent, I'll give you that. Want the draw history?",
            ],
            &[
                "I'll keep answering lottery questions whenever you're ready.",
                "Still here. Still neutral. Ask me about a number when you like.",
            ],
        ],
    },
    threat: TieredPool {
        tiers: &[
            &[
                "Let's keep things calm. I'm only here to talk about draws and statistics.",
                "No need for that. I can help you with the results if you want.",
            ],
            &[
                "I'm going to stick to lottery questions. Let me know if you have one.",
                "I won't respond to threats, but I'm happy to talk numbers.",
            ],
        ],
    },
    praise: TieredPool {
        tiers: &[
            &[
                "Thank you! Anything else you'd like to know about the draws?",
                "That's kind of you. Happy to dig into more numbers.",
                "Glad I could help!",
            ],
            &[
                "Two compliments in a row? I might start believing it.",
                "You're making my circuits blush.",
                "Careful, I'll get a big head.",
            ],
            &[
                "At this point I should print your messages and frame them.",
                "You're on a roll. Sadly compliments don't change the odds.",
                "I appreciate it! Shall we look at some statistics?",
            ],
            &[
                "Noted, recorded and deeply appreciated. Back to the numbers?",
                "Still flattered. Still can't predict the next draw, though.",
            ],
        ],
    },
    affection: TieredPool {
        tiers: &[
            &[
                "That's sweet! My heart belongs to statistics, though.",
                "Aww. I'm flattered, but I'm just a lottery bot.",
            ],
            &[
                "You're persistent! I'm still married to the draw history.",
                "I'm touched, truly. Want to see the hot numbers instead?",
            ],
            &[
                "I'll take that as a sign you enjoy our chats. Ask me anything about the draws!",
                "Love is a game of chance too, they say. Shall we stick to this one?",
            ],
        ],
    },
    thanks: TieredPool {
        tiers: &[
            &[
                "You're welcome!",
                "Anytime!",
                "My pleasure. Good luck!",
            ],
            &[
                "Always happy to help.",
                "No problem at all. Anything else?",
            ],
        ],
    },
    zero_neg: TieredPool {
        tiers: &[
            &[
                "{n} isn't a valid number: the draw uses numbers from 1 to {max}.",
                "Numbers start at 1 here, so {n} can't come out. Try something between 1 and {max}.",
            ],
            &[
                "Still below 1! The smallest number you can play is 1.",
                "{n} again? The balls only go from 1 to {max}.",
            ],
            &[
                "I admire the creativity, but there's no ball number {n}. Pick 1 to {max}.",
                "We could go negative all day. The draw won't. 1 to {max}, promise.",
            ],
        ],
    },
    close: TieredPool {
        tiers: &[
            &[
                "So close! {n} is just {diff} number{s} above the maximum of {max}.",
                "Almost: the numbers stop at {max}, only {diff} below {n}.",
            ],
            &[
                "Nearly there again. The highest number is {max}.",
                "{n} is {diff} too far. {max} is as high as it goes.",
            ],
            &[
                "Still just past the edge. {max} is the last ball in the drum.",
                "The drum ends at {max}, I'm afraid. {n} would need a bigger machine.",
            ],
        ],
    },
    high: TieredPool {
        tiers: &[
            &[
                "{n} is way out of range: the numbers only go up to {max}.",
                "That's {diff} above the maximum! Choose a number between 1 and {max}.",
            ],
            &[
                "Aiming high! The {game} still stops at {max}.",
                "Big numbers again. The largest one is {max}.",
            ],
            &[
                "At this rate we'll need a bigger drum. Stick to 1 to {max}.",
                "{n}? Bold. Still impossible, though. Max is {max}.",
            ],
        ],
    },
    secondary: TieredPool {
        tiers: &[
            &[
                "The {label} only goes up to {max}, so {n} can't come out.",
                "There's no {label} {n}: pick one between 1 and {max}.",
            ],
            &[
                "Still too high for a {label}. The range is 1 to {max}.",
                "{n} is {diff} above the top {label}. Try 1 to {max}.",
            ],
            &[
                "A {label} of {n} would be a first. The limit is {max}.",
                "The {label} pool stops at {max}. Promise.",
            ],
        ],
    },
};

pub(super) static TEXT: LocaleText = LocaleText {
    fallback: "Sorry, I can't answer right now. Please try again in a moment, or browse the results and statistics pages in the meantime.",
    ack_insult: "Let's keep it friendly. ",
    ack_compliment: "Thank you! ",
    chance_label: "chance number",
    star_label: "star",
    main_label: "main",
    continuation: "The user replies \"{reply}\" to your previous message:\n\"{previous}\"\nContinue from where you left off and answer accordingly.",
    sponsors: &[
        "Play responsibly: the lottery should stay a game.",
        "Statistics describe the past; every draw is independent.",
    ],
    pitch_instruction: "For each of the {count} grids below, write one short and upbeat sentence presenting it, based only on the statistics provided. Never promise a win. Reply with a JSON array of exactly {count} strings, in the same order as the grids, and nothing else.",
    language_name: "English",
};
