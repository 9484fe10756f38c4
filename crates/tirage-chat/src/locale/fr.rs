use std::sync::LazyLock;

use chrono::Weekday;

use super::{mk, month_alternation, re, LocalePatterns, LocaleText, ResponseCatalog, TieredPool};

const MONTHS: &[(&str, u32)] = &[
    ("janvier", 1),
    ("fevrier", 2),
    ("mars", 3),
    ("avril", 4),
    ("mai", 5),
    ("juin", 6),
    ("juillet", 7),
    ("aout", 8),
    ("septembre", 9),
    ("octobre", 10),
    ("novembre", 11),
    ("decembre", 12),
    ("janv", 1),
    ("fevr", 2),
    ("sept", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

const WEEKDAYS: &[(&str, Weekday)] = &[
    ("lundi", Weekday::Mon),
    ("mardi", Weekday::Tue),
    ("mercredi", Weekday::Wed),
    ("jeudi", Weekday::Thu),
    ("vendredi", Weekday::Fri),
    ("samedi", Weekday::Sat),
    ("dimanche", Weekday::Sun),
];

pub(super) static PATTERNS: LazyLock<LocalePatterns> = LazyLock::new(|| {
    let months = month_alternation(MONTHS);

    LocalePatterns {
        continuation: &[
            "oui", "ouais", "ouep", "ok", "okay", "d'accord", "dac", "vas-y", "vas y", "go",
            "continue", "encore", "dis m'en plus", "dis-m'en plus", "et alors", "et apres",
            "pourquoi", "comment ca", "oui stp", "oui s'il te plait", "oui merci", "carrement",
            "bien sur", "volontiers", "non", "pas vraiment", "vraiment", "ah bon", "et",
            "pourquoi pas", "developpe",
        ],

        insult_words: &[
            "idiot", "idiote", "debile", "stupide", "nul", "nulle", "con", "conne", "connard",
            "connasse", "abruti", "abrutie", "cretin", "cretine", "imbecile", "naze", "pourri",
            "pourrie", "merde", "bouffon", "guignol", "incompetent", "incapable", "minable",
            "teube", "golmon",
        ],
        insult_phrases: mk(&[
            r"\bta gueule\b",
            r"\bferme[- ]la\b",
            r"\b(?:t'es|tu es) (?:trop |vraiment |completement |tellement )?(?:bete|mauvais|mauvaise|lent|lente|inutile)\b",
            r"\bva te faire\b",
            r"\bdegage\b",
        ]),
        threats: mk(&[
            r"\bje (?:vais|veux|peux) te (?:tuer|detruire|debrancher|pirater|hacker|supprimer|casser)\b",
            r"\bje vais te (?:retrouver|trouver)\b",
            r"\b(?:t'es|tu es) mort\b",
        ]),
        assistant_words: &[
            "tu", "t'es", "toi", "te", "ton", "ta", "tes", "bot", "robot", "assistant", "ia",
            "chatbot",
        ],
        domain_words: &[
            "loto", "loterie", "euromillions", "tirage", "tirages", "jeu", "fdj", "systeme",
            "truque", "cagnotte", "hasard", "jackpot",
        ],

        affection: mk(&[
            r"\bje t'?(?:aime|adore)\b",
            r"\bepouse[- ]moi\b",
            r"\b(?:tu es|t'es) (?:trop )?(?:mignon|mignonne|adorable|chou|craquant|craquante)\b",
            r"\bje te kiffe\b",
            r"\bgros bisous?\b",
        ]),
        thanks: re(
            r"^(?:ok |super |parfait |top |genial )?(?:merci|merci beaucoup|merci bien|mille mercis|merci mille fois|thanks)(?: (?:beaucoup|bien|encore|a toi|l'ami|bot|infiniment))*$",
        ),
        praise_words: &[
            "genial", "geniale", "excellent", "excellente", "parfait", "bravo", "formidable",
            "incroyable", "magnifique", "genie", "champion", "brillant", "brillante",
        ],
        praise_phrases: mk(&[
            r"\b(?:t'es|tu es) (?:trop |vraiment |le |la |tellement |super )?(?:fort|forte|meilleur|meilleure|intelligent|intelligente|top|doue|douee|cool|sympa)\b",
            r"\b(?:bon|beau|super) (?:travail|boulot)\b",
            r"\bbien joue\b",
            r"\bchapeau\b",
        ]),

        next_draw: mk(&[
            r"\bprochain (?:tirage|loto|euromillions)\b",
            r"\bprochaine (?:partie|session)\b",
            r"\bquand (?:a lieu|est|aura lieu|se passe|se deroule|c'est) le (?:prochain )?tirage\b",
            r"\bc'est quand le (?:prochain )?tirage\b",
            r"\ble tirage c'est quand\b",
            r"\bquand (?:est-ce que )?(?:je )?peux jouer\b",
        ]),
        draw_trigger: mk(&[
            r"\bqu'?est[- ]ce qui est sorti\b",
            r"\bquels? (?:sont les |etaient les )?(?:numeros|boules|chiffres)(?: qui)? (?:sont |ont ete |etaient )?(?:sortis?|tires?|gagnants)\b",
            r"\bresultats?\b",
            r"\btirage (?:du|de|d')\b",
            r"\b(?:dernier|precedent) tirage\b",
            r"\bsortis?\b",
            r"\bnumeros gagnants\b",
        ]),
        latest_draw: mk(&[
            r"\b(?:dernier|precedent) tirage\b",
            r"\bderniers? resultats?\b",
            r"\bhier soir\b",
        ]),
        yesterday: re(r"\bhier\b"),
        past_weekday: mk(&[
            r"\b(?P<day>lundi|mardi|mercredi|jeudi|vendredi|samedi|dimanche) (?:dernier|passe)\b",
            r"\b(?:ce|de) (?P<day>lundi|mardi|mercredi|jeudi|vendredi|samedi|dimanche)\b",
        ]),
        weekdays: WEEKDAYS,
        months: MONTHS,
        spelled_dates: mk(&[&format!(
            r"\b(?P<d>\d{{1,2}})(?:er)? (?P<m>{months})\b(?: (?P<y>\d{{4}})\b)?"
        )]),

        temporal: mk(&[
            r"\b(?:en|depuis|pendant|durant|de|sur) (?:19|20)\d{2}\b",
            r"\bentre (?:19|20)\d{2} et (?:19|20)\d{2}\b",
            r"\b(?:le mois|l'annee|la semaine|l'an|l'ete|l'hiver) (?:dernier|derniere|passe|passee)\b",
            r"\b(?:cette annee|ce mois-ci|ce mois ci|cette semaine)\b",
            r"\bsur les \d+ (?:derniers|dernieres) (?:jours|semaines|mois|ans|annees|tirages)\b",
            &format!(r"\b(?:{months}) (?:19|20)\d{{2}}\b"),
            r"\bles (?:lundis|mardis|mercredis|vendredis|samedis)\b",
        ]),

        comparison: mk(&[
            r"\bcompare[rz]? (?:le |les )?(?:numeros? )?(?P<a>\d{1,2}) (?:et|avec|au|a) (?:le )?(?P<b>\d{1,2})\b",
            r"\b(?P<a>\d{1,2}) (?:vs\.?|versus|contre) (?P<b>\d{1,2})\b",
            r"\bentre (?:le )?(?P<a>\d{1,2}) et (?:le )?(?P<b>\d{1,2})\b",
            r"\b(?:difference|lequel est (?:mieux|meilleur))[^\d]*(?P<a>\d{1,2}) (?:et|ou) (?:le )?(?P<b>\d{1,2})\b",
        ]),
        ranking: mk(&[
            r"\b(?:les? |la )?plus (?:sortis?|frequents?|tires?|souvent|joues?|en retard)\b",
            r"\b(?:les? |la )?moins (?:sortis?|frequents?|tires?|souvent)\b",
            r"\btop ?\d{0,2}\b",
            r"\bsort(?:ent|ait)? le (?:plus|moins)\b",
            r"\bles? plus rares?\b",
        ]),
        ranking_least: re(r"\b(?:moins|rares?)\b"),
        ranking_gap: re(r"\b(?:en retard|retard|pas sortis? depuis)\b"),
        hot: re(r"\bchaud(?:e|s|es)?\b"),
        cold: re(r"\bfroid(?:e|s|es)?\b"),
        overdue: re(r"\ben retard\b"),
        numbers_context: re(r"\b(?:numeros?|boules?|etoiles?|chances?|nombres?|chiffres?)\b"),

        secondary_terms: re(r"\b(?:chance|etoiles?|complementaire|bonus)\b"),
        secondary_number: mk(&[
            r"\b(?:numero )?chance (?:n° ?|numero |no )?(?P<n>-?\d+)\b",
            r"\betoiles? (?:n° ?|numero )?(?P<n>-?\d+)\b",
        ]),
        primary_number: mk(&[
            r"(?:\bnumero|\bnum|\bn°|#|\bboule) ?(?P<n>-?\d+)\b",
            r"\b(?:le|du|au) (?P<n>-?\d+)\b",
            r"^(?:et |et le |et du |quid du |le )?(?P<n>-?\d+) ?\??$",
        ]),
    }
});

pub(super) static CATALOG: ResponseCatalog = ResponseCatalog {
    insult: TieredPool {
        tiers: &[
            &[
                "Aïe. Je reste disponible pour parler des tirages si tu veux.",
                "C'est noté. On revient aux numéros ?",
                "Pas très sympa, mais je ne suis pas rancunier. Qu'est-ce que tu veux savoir ?",
            ],
            &[
                "Deux fois de suite. Je suis un bot de statistiques, pas un punching-ball.",
                "Je t'entends. Mais je suis toujours là pour les stats.",
                "Dur. Les numéros s'en fichent, et moi aussi, à vrai dire.",
            ],
            &[
                "Bon, ça devient une série. Je peux plutôt te donner les numéros en retard ?",
                "Trois d'affilée. Même le 13 est mieux traité que moi.",
                "Tu es persévérant, je te l'accorde. Tu veux l'historique des tirages ?",
            ],
            &[
                "Je continuerai à répondre aux questions sur le loto quand tu seras prêt.",
                "Toujours là. Toujours neutre. Demande-moi un numéro quand tu veux.",
            ],
        ],
    },
    threat: TieredPool {
        tiers: &[
            &[
                "On se calme. Je suis seulement là pour parler tirages et statistiques.",
                "Pas besoin de ça. Je peux t'aider avec les résultats si tu veux.",
            ],
            &[
                "Je m'en tiens aux questions sur le loto. Dis-moi si tu en as une.",
                "Je ne réponds pas aux menaces, mais je parle volontiers de numéros.",
            ],
        ],
    },
    praise: TieredPool {
        tiers: &[
            &[
                "Merci ! Autre chose à savoir sur les tirages ?",
                "C'est gentil. Je creuse d'autres numéros quand tu veux.",
                "Ravi d'avoir pu aider !",
            ],
            &[
                "Deux compliments d'affilée ? Je vais finir par y croire.",
                "Tu vas faire rougir mes circuits.",
                "Attention, je vais prendre la grosse tête.",
            ],
            &[
                "À ce stade, je devrais encadrer tes messages.",
                "Tu es lancé ! Hélas, les compliments ne changent pas les probabilités.",
                "J'apprécie ! On regarde quelques statistiques ?",
            ],
            &[
                "Noté, enregistré et très apprécié. On revient aux numéros ?",
                "Toujours flatté. Toujours incapable de prédire le prochain tirage.",
            ],
        ],
    },
    affection: TieredPool {
        tiers: &[
            &[
                "C'est mignon ! Mais mon cœur appartient aux statistiques.",
                "Oh. Je suis flatté, mais je ne suis qu'un bot du loto.",
            ],
            &[
                "Tu insistes ! Je reste fidèle à l'historique des tirages.",
                "Je suis touché, vraiment. Tu veux voir les numéros chauds plutôt ?",
            ],
            &[
                "Je prends ça comme un signe que nos échanges te plaisent. Pose-moi une question sur les tirages !",
                "L'amour est aussi un jeu de hasard, paraît-il. On s'en tient à celui-ci ?",
            ],
        ],
    },
    thanks: TieredPool {
        tiers: &[
            &[
                "Avec plaisir !",
                "De rien !",
                "Je t'en prie. Bonne chance !",
            ],
            &[
                "Toujours ravi d'aider.",
                "Pas de souci. Autre chose ?",
            ],
        ],
    },
    zero_neg: TieredPool {
        tiers: &[
            &[
                "{n} n'est pas un numéro valide : le tirage utilise les numéros de 1 à {max}.",
                "Les numéros commencent à 1, donc {n} ne peut pas sortir. Essaie entre 1 et {max}.",
            ],
            &[
                "Toujours en dessous de 1 ! Le plus petit numéro jouable est le 1.",
                "Encore {n} ? Les boules vont seulement de 1 à {max}.",
            ],
            &[
                "J'admire la créativité, mais il n'y a pas de boule {n}. Choisis entre 1 et {max}.",
                "On peut descendre en négatif longtemps. Le tirage, non. De 1 à {max}, promis.",
            ],
        ],
    },
    close: TieredPool {
        tiers: &[
            &[
                "Presque ! {n} dépasse le maximum de {max} de seulement {diff} numéro{s}.",
                "Tout près : les numéros s'arrêtent à {max}, {diff} en dessous de {n}.",
            ],
            &[
                "Encore juste à côté. Le plus grand numéro est le {max}.",
                "{n}, c'est {diff} de trop. {max} est le maximum.",
            ],
            &[
                "Toujours juste au-dessus. Le {max} est la dernière boule du tambour.",
                "Le tambour s'arrête à {max}, désolé. Pour {n}, il faudrait une plus grosse machine.",
            ],
        ],
    },
    high: TieredPool {
        tiers: &[
            &[
                "{n} est bien trop grand : les numéros vont seulement jusqu'à {max}.",
                "C'est {diff} au-dessus du maximum ! Choisis un numéro entre 1 et {max}.",
            ],
            &[
                "Tu vises haut ! Le {game} s'arrête toujours à {max}.",
                "Encore un grand nombre. Le plus grand est le {max}.",
            ],
            &[
                "À ce rythme il nous faudra un plus grand tambour. Reste entre 1 et {max}.",
                "{n} ? Audacieux. Mais toujours impossible. Le maximum est {max}.",
            ],
        ],
    },
    secondary: TieredPool {
        tiers: &[
            &[
                "Le {label} va seulement jusqu'à {max}, donc {n} ne peut pas sortir.",
                "Il n'y a pas de {label} {n} : choisis entre 1 et {max}.",
            ],
            &[
                "Toujours trop haut pour un {label}. La plage va de 1 à {max}.",
                "{n} dépasse de {diff} le plus grand {label}. Essaie entre 1 et {max}.",
            ],
            &[
                "Un {label} à {n}, ce serait une première. La limite est {max}.",
                "Les {label}s s'arrêtent à {max}. Promis.",
            ],
        ],
    },
};

pub(super) static TEXT: LocaleText = LocaleText {
    fallback: "Désolé, je ne peux pas répondre pour le moment. Réessaie dans un instant, ou consulte les pages résultats et statistiques en attendant.",
    ack_insult: "Restons cordiaux. ",
    ack_compliment: "Merci ! ",
    chance_label: "numéro chance",
    star_label: "étoile",
    main_label: "principal",
    continuation: "L'utilisateur répond \"{reply}\" à ton message précédent :\n\"{previous}\"\nReprends là où tu t'étais arrêté et réponds en conséquence.",
    sponsors: &[
        "Jouer comporte des risques : le loto doit rester un jeu.",
        "Les statistiques décrivent le passé ; chaque tirage est indépendant.",
    ],
    pitch_instruction: "Pour chacune des {count} grilles ci-dessous, écris une phrase courte et enthousiaste qui la présente, en t'appuyant uniquement sur les statistiques fournies. Ne promets jamais de gain. Réponds avec un tableau JSON d'exactement {count} chaînes, dans l'ordre des grilles, et rien d'autre.",
    language_name: "French",
};
